//! Session reducer
//!
//! Only handles actions scoped to one tab. Creating and destroying sessions
//! is the registry's job and happens in the root pass.

use std::sync::Arc;

use livestyle_core::prelude::*;
use livestyle_core::Patch;

use super::replace_if_changed;
use crate::action::Action;
use crate::state::{Session, SessionMap};

pub(crate) fn reduce(sessions: &Arc<SessionMap>, action: &Action) -> Arc<SessionMap> {
    let Some(tab) = action.session_tab() else {
        return sessions.clone();
    };
    let Some(session) = sessions.get(&tab) else {
        debug!("{}, dropping {:?}", Error::NoSessionForTab { tab }, action);
        return sessions.clone();
    };

    match reduce_session(session, action) {
        Some(next) => {
            let mut map = (**sessions).clone();
            map.insert(tab, Arc::new(next));
            Arc::new(map)
        }
        None => sessions.clone(),
    }
}

/// `None` means the session is unchanged
fn reduce_session(session: &Session, action: &Action) -> Option<Session> {
    match action {
        Action::SetCssomStylesheets { stylesheets, .. } => {
            replace_list(&session.cssom_stylesheets, stylesheets.as_ref()).map(|list| Session {
                cssom_stylesheets: list,
                ..session.clone()
            })
        }

        Action::SetDevtoolsStylesheets { stylesheets, .. } => {
            replace_list(&session.devtools_stylesheets, stylesheets.as_ref()).map(|list| {
                Session {
                    devtools_stylesheets: list,
                    ..session.clone()
                }
            })
        }

        Action::AddDevtoolsStylesheet { url, .. } => {
            let mut list = session
                .devtools_stylesheets
                .as_deref()
                .cloned()
                .unwrap_or_default();
            if list.contains(url) {
                return None;
            }
            list.push(url.clone());
            Some(Session {
                devtools_stylesheets: Some(Arc::new(list)),
                ..session.clone()
            })
        }

        Action::SetUserStylesheets { stylesheets, .. } => {
            replace_if_changed(&session.user_stylesheets, stylesheets).map(|map| Session {
                user_stylesheets: map,
                ..session.clone()
            })
        }

        Action::SetStylesheets { stylesheets, .. } => {
            replace_if_changed(&session.stylesheets, stylesheets).map(|list| Session {
                stylesheets: list,
                ..session.clone()
            })
        }

        Action::SetAutoMapping { mapping, .. } => {
            replace_if_changed(&session.auto_mapping, mapping).map(|mapping| Session {
                auto_mapping: mapping,
                ..session.clone()
            })
        }

        Action::SetMapping { mapping, .. } => {
            replace_if_changed(&session.mapping, mapping).map(|mapping| Session {
                mapping,
                ..session.clone()
            })
        }

        Action::QueuePatches { uri, patches, .. } if !patches.is_empty() => {
            let existing = session.patches.get(uri).map(|p| p.as_slice());
            Some(splice_patches(session, uri, existing.unwrap_or_default(), patches))
        }

        Action::RequeuePatches { uri, patches, .. } if !patches.is_empty() => {
            let existing = session.patches.get(uri).map(|p| p.as_slice());
            Some(splice_patches(session, uri, patches, existing.unwrap_or_default()))
        }

        Action::ClearPatches { uri, .. } => {
            if !session.patches.contains_key(uri) {
                return None;
            }
            let mut queue = (*session.patches).clone();
            queue.remove(uri);
            Some(Session {
                patches: Arc::new(queue),
                ..session.clone()
            })
        }

        Action::AddRequestedUnsavedFiles { files, .. } => {
            if files
                .iter()
                .all(|f| session.requested_unsaved_files.contains(f))
            {
                return None;
            }
            let mut requested = (*session.requested_unsaved_files).clone();
            requested.extend(files.iter().cloned());
            Some(Session {
                requested_unsaved_files: Arc::new(requested),
                ..session.clone()
            })
        }

        _ => None,
    }
}

fn replace_list(
    current: &Option<Arc<Vec<String>>>,
    incoming: Option<&Vec<String>>,
) -> Option<Option<Arc<Vec<String>>>> {
    match (current, incoming) {
        (None, None) => None,
        (Some(current), Some(incoming)) if **current == *incoming => None,
        (_, incoming) => Some(incoming.map(|list| Arc::new(list.clone()))),
    }
}

/// Queue `front` followed by `back` for `uri`
fn splice_patches(session: &Session, uri: &str, front: &[Patch], back: &[Patch]) -> Session {
    let mut list = Vec::with_capacity(front.len() + back.len());
    list.extend_from_slice(front);
    list.extend_from_slice(back);

    let mut queue = (*session.patches).clone();
    queue.insert(uri.to_string(), Arc::new(list));
    Session {
        patches: Arc::new(queue),
        ..session.clone()
    }
}
