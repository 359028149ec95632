//! Host tab list reducer

use std::sync::Arc;

use livestyle_core::Tab;

use super::replace_if_changed;
use crate::action::Action;

pub(crate) fn reduce(tabs: &Arc<Vec<Tab>>, action: &Action) -> Arc<Vec<Tab>> {
    match action {
        Action::SetTabs(list) => replace_if_changed(tabs, list).unwrap_or_else(|| tabs.clone()),

        Action::TabUpdated(tab) => {
            let mut next = (**tabs).clone();
            match next.iter_mut().find(|existing| existing.id == tab.id) {
                Some(existing) if existing == tab => return tabs.clone(),
                Some(existing) => *existing = tab.clone(),
                None => next.push(tab.clone()),
            }
            Arc::new(next)
        }

        Action::TabClosed(id) => {
            if !tabs.iter().any(|tab| tab.id == *id) {
                return tabs.clone();
            }
            Arc::new(tabs.iter().filter(|tab| tab.id != *id).cloned().collect())
        }

        _ => tabs.clone(),
    }
}
