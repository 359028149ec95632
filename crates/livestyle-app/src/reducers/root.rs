//! Whole-state pass run after the per-field reducers

use std::sync::Arc;

use livestyle_core::normalize_url;
use livestyle_core::prelude::*;

use crate::action::Action;
use crate::registry;
use crate::state::AppState;

pub(crate) fn reduce(state: &Arc<AppState>, action: &Action) -> Arc<AppState> {
    match action {
        Action::ReconcileSessions => {
            let sessions = registry::reconcile(&state.sessions, &state.pages, &state.tabs);
            if Arc::ptr_eq(&sessions, &state.sessions) {
                return state.clone();
            }
            Arc::new(AppState {
                sessions,
                ..(**state).clone()
            })
        }

        Action::LoadPersisted(restored) => {
            let mut pages = (*state.pages).clone();
            let mut added = 0;
            for (url, page) in restored {
                let key = normalize_url(url);
                if !pages.contains_key(&key) {
                    pages.insert(key, page.clone());
                    added += 1;
                }
            }
            if added == 0 {
                return state.clone();
            }
            debug!("Restored {} persisted page(s)", added);
            Arc::new(AppState {
                pages: Arc::new(pages),
                ..(**state).clone()
            })
        }

        _ => state.clone(),
    }
}
