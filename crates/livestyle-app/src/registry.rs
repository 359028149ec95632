//! Session registry - reconciles sessions against open tabs and pages
//!
//! A session exists for a tab exactly while the tab is open and shows an
//! enabled page. Sessions that stay valid are carried over untouched, with
//! their resource lists and patch queues intact.

use std::collections::HashMap;
use std::sync::Arc;

use livestyle_core::prelude::*;
use livestyle_core::{Tab, TabId};

use crate::state::{PageMap, Session, SessionMap};

/// Desired session map for the given tabs and pages.
///
/// Returns the input `Arc` when no session has to be added or removed, so
/// running it again without intervening changes is a no-op.
pub fn reconcile(sessions: &Arc<SessionMap>, pages: &PageMap, tabs: &[Tab]) -> Arc<SessionMap> {
    let open: HashMap<TabId, String> = tabs.iter().map(|tab| (tab.id, tab.page_key())).collect();
    let is_enabled = |key: &str| pages.get(key).is_some_and(|page| page.enabled);

    let stale: Vec<TabId> = sessions
        .iter()
        .filter(|(tab, session)| match open.get(tab) {
            // a tab that navigated elsewhere no longer shows this session's page
            Some(key) => *key != session.page || !is_enabled(&session.page),
            None => true,
        })
        .map(|(tab, _)| *tab)
        .collect();

    let mut fresh: Vec<(TabId, &str)> = Vec::new();
    for tab in tabs {
        let key = &open[&tab.id];
        let keeps_session = sessions.get(&tab.id).is_some_and(|s| s.page == *key);
        if !keeps_session && is_enabled(key) && !fresh.iter().any(|(id, _)| *id == tab.id) {
            fresh.push((tab.id, key.as_str()));
        }
    }

    if stale.is_empty() && fresh.is_empty() {
        return sessions.clone();
    }

    let mut next = (**sessions).clone();
    for tab in &stale {
        debug!("Removing session for tab {}", tab);
        next.remove(tab);
    }
    for (tab, page) in fresh {
        info!("Creating session for tab {} ({})", tab, page);
        next.insert(tab, Arc::new(Session::new(page)));
    }
    Arc::new(next)
}
