//! Reducers - pure `(state, action) → state` functions
//!
//! Organized by top-level state field:
//! - `pages`: page configuration (enable, direction, user mapping, user stylesheets)
//! - `sessions`: per-tab session resources and patch queues
//! - `tabs`: host-reported tab list
//! - `editor_files`: global editor file list
//! - `root`: whole-state pass (persisted-state merge, session reconciliation)
//!
//! Every reducer hands back its input `Arc` untouched when the action changes
//! nothing, so subscribers only fire on real change.

pub(crate) mod editor_files;
pub(crate) mod pages;
pub(crate) mod root;
pub(crate) mod sessions;
pub(crate) mod tabs;


use std::sync::Arc;

use crate::action::Action;
use crate::state::AppState;

/// The application reducer handed to the [`Store`](crate::store::Store)
pub fn reduce(state: &Arc<AppState>, action: &Action) -> Arc<AppState> {
    let pages = pages::reduce(&state.pages, action);
    let sessions = sessions::reduce(&state.sessions, action);
    let editor_files = editor_files::reduce(&state.editor_files, action);
    let tabs = tabs::reduce(&state.tabs, action);

    let unchanged = Arc::ptr_eq(&pages, &state.pages)
        && Arc::ptr_eq(&sessions, &state.sessions)
        && Arc::ptr_eq(&editor_files, &state.editor_files)
        && Arc::ptr_eq(&tabs, &state.tabs);

    let next = if unchanged {
        state.clone()
    } else {
        Arc::new(AppState {
            pages,
            sessions,
            editor_files,
            tabs,
        })
    };

    root::reduce(&next, action)
}

/// `Some(new Arc)` if `incoming` differs from `current`
pub(crate) fn replace_if_changed<T>(current: &Arc<T>, incoming: &T) -> Option<Arc<T>>
where
    T: PartialEq + Clone,
{
    if **current == *incoming {
        None
    } else {
        Some(Arc::new(incoming.clone()))
    }
}
