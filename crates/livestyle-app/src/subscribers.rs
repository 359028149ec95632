//! Store subscribers
//!
//! Derived session data is recomputed here, each piece reacting only to the
//! inputs it depends on:
//!
//! | Watches | Produces |
//! |---------|----------|
//! | tabs, pages | `ReconcileSessions` |
//! | session raw stylesheet lists | `SetStylesheets` |
//! | session stylesheets, editor files | `SetAutoMapping` |
//! | session stylesheets + auto mapping, editor files, pages | `SetMapping` |
//!
//! Side effects go to the engine as [`Message`]s: session lifecycle, patch
//! queue growth, unsaved-file requests and page persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::mpsc;

use livestyle_core::prelude::*;
use livestyle_core::{Mapping, TabId};

use crate::action::Action;
use crate::auto_map::{auto_map, resolve_mapping};
use crate::message::Message;
use crate::state::{AppState, PatchQueue, Session, SessionMap};
use crate::store::Store;
use crate::transaction::TxKey;

pub type AppStore = Store<AppState, Action>;

type RawStylesheets = (
    Option<Arc<Vec<String>>>,
    Option<Arc<Vec<String>>>,
    Arc<BTreeMap<String, String>>,
);

type MappingInputs = (Arc<Vec<String>>, Arc<Mapping>);

/// Wire every subscriber onto `store`
pub fn install(store: &mut AppStore, msg_tx: &mpsc::UnboundedSender<Message>) {
    watch_registry(store);
    watch_stylesheets(store);
    watch_auto_mapping(store);
    watch_mapping(store);
    watch_session_lifecycle(store, msg_tx.clone());
    watch_patch_queues(store, msg_tx.clone());
    watch_unsaved_files(store, msg_tx.clone());
    watch_pages(store, msg_tx.clone());
}

fn send(msg_tx: &mpsc::UnboundedSender<Message>, msg: Message) {
    if msg_tx.send(msg).is_err() {
        trace!("Engine loop gone, dropping subscriber message");
    }
}

fn watch_registry(store: &mut AppStore) {
    store.subscribe(
        |s: &AppState| (s.tabs.clone(), s.pages.clone()),
        |_, _, cx| cx.dispatch(Action::ReconcileSessions),
    );
}

fn watch_stylesheets(store: &mut AppStore) {
    store.subscribe_deep_key(
        |s: &AppState| s.sessions.clone(),
        |session: &Arc<Session>| -> RawStylesheets {
            (
                session.cssom_stylesheets.clone(),
                session.devtools_stylesheets.clone(),
                session.user_stylesheets.clone(),
            )
        },
        |tab: &TabId, raw: &RawStylesheets, _, cx| {
            cx.dispatch(Action::SetStylesheets {
                tab: *tab,
                stylesheets: stylesheet_union(raw),
            });
        },
    );
}

/// CSSOM list first, then devtools-only and user stylesheet URLs; no duplicates
fn stylesheet_union((cssom, devtools, user): &RawStylesheets) -> Vec<String> {
    let mut seen = BTreeSet::new();
    cssom
        .iter()
        .flat_map(|list| list.iter())
        .chain(devtools.iter().flat_map(|list| list.iter()))
        .chain(user.values())
        .filter(|url| seen.insert(url.as_str()))
        .cloned()
        .collect()
}

fn watch_auto_mapping(store: &mut AppStore) {
    store.subscribe_deep_key(
        |s: &AppState| s.sessions.clone(),
        |session: &Arc<Session>| session.stylesheets.clone(),
        |tab: &TabId, stylesheets: &Arc<Vec<String>>, _, cx| {
            let mapping = auto_map(stylesheets, &cx.state().editor_files);
            cx.dispatch(Action::SetAutoMapping { tab: *tab, mapping });
        },
    );

    store.subscribe(
        |s: &AppState| s.editor_files.clone(),
        |editor_files, _, cx| {
            let updates: Vec<Action> = cx
                .state()
                .sessions
                .iter()
                .map(|(tab, session)| Action::SetAutoMapping {
                    tab: *tab,
                    mapping: auto_map(&session.stylesheets, editor_files),
                })
                .collect();
            for action in updates {
                cx.dispatch(action);
            }
        },
    );
}

/// Effective mapping of `session` in `state`
fn mapping_for(state: &AppState, session: &Session) -> Mapping {
    let user = state
        .page_of(session)
        .map(|page| page.user_mapping.clone())
        .unwrap_or_default();
    resolve_mapping(
        &session.stylesheets,
        &state.editor_files,
        &session.auto_mapping,
        &user,
    )
}

fn watch_mapping(store: &mut AppStore) {
    store.subscribe_deep_key(
        |s: &AppState| s.sessions.clone(),
        |session: &Arc<Session>| -> MappingInputs {
            (session.stylesheets.clone(), session.auto_mapping.clone())
        },
        |tab: &TabId, _: &MappingInputs, _, cx| {
            let Some(session) = cx.state().session(*tab) else {
                return;
            };
            let mapping = mapping_for(cx.state(), session);
            cx.dispatch(Action::SetMapping { tab: *tab, mapping });
        },
    );

    store.subscribe(
        |s: &AppState| (s.editor_files.clone(), s.pages.clone()),
        |_, _, cx| {
            let updates: Vec<Action> = cx
                .state()
                .sessions
                .iter()
                .map(|(tab, session)| Action::SetMapping {
                    tab: *tab,
                    mapping: mapping_for(cx.state(), session),
                })
                .collect();
            for action in updates {
                cx.dispatch(action);
            }
        },
    );
}

fn watch_session_lifecycle(store: &mut AppStore, msg_tx: mpsc::UnboundedSender<Message>) {
    store.subscribe(
        |s: &AppState| s.sessions.clone(),
        move |sessions: &Arc<SessionMap>, previous: &Arc<SessionMap>, _| {
            // same tab, different page: the old session ended
            let replaced = |tab: &TabId, session: &Arc<Session>| {
                sessions
                    .get(tab)
                    .is_some_and(|current| current.page != session.page)
            };

            let destroyed: Vec<TabId> = previous
                .iter()
                .filter(|(tab, session)| !sessions.contains_key(tab) || replaced(tab, session))
                .map(|(tab, _)| *tab)
                .collect();
            let created: Vec<TabId> = sessions
                .iter()
                .filter(|(tab, _)| !previous.contains_key(tab) || destroyed.contains(tab))
                .map(|(tab, _)| *tab)
                .collect();

            if !created.is_empty() || !destroyed.is_empty() {
                send(&msg_tx, Message::SessionsChanged { created, destroyed });
            }
        },
    );
}

fn watch_patch_queues(store: &mut AppStore, msg_tx: mpsc::UnboundedSender<Message>) {
    store.subscribe_deep_key(
        |s: &AppState| s.sessions.clone(),
        |session: &Arc<Session>| session.patches.clone(),
        move |tab: &TabId, queue: &Arc<PatchQueue>, previous: Option<&Arc<PatchQueue>>, _| {
            for (url, patches) in queue.iter() {
                let grew = previous
                    .and_then(|prev| prev.get(url))
                    .map_or(true, |old| !Arc::ptr_eq(old, patches));
                if grew && !patches.is_empty() {
                    send(&msg_tx, Message::RequestTransaction(TxKey::new(*tab, url)));
                }
            }
        },
    );
}

fn watch_unsaved_files(store: &mut AppStore, msg_tx: mpsc::UnboundedSender<Message>) {
    store.subscribe_deep_key(
        |s: &AppState| s.sessions.clone(),
        |session: &Arc<Session>| session.mapping.clone(),
        move |tab: &TabId, mapping: &Arc<Mapping>, _, cx| {
            let Some(session) = cx.state().session(*tab) else {
                return;
            };
            let files: Vec<String> = mapping
                .values()
                .filter(|file| !session.requested_unsaved_files.contains(*file))
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if files.is_empty() {
                return;
            }

            send(
                &msg_tx,
                Message::RequestUnsavedFiles {
                    files: files.clone(),
                },
            );
            cx.dispatch(Action::AddRequestedUnsavedFiles { tab: *tab, files });
        },
    );
}

fn watch_pages(store: &mut AppStore, msg_tx: mpsc::UnboundedSender<Message>) {
    store.subscribe(
        |s: &AppState| s.pages.clone(),
        move |pages, _, _| send(&msg_tx, Message::PersistPages(pages.clone())),
    );
}

#[cfg(test)]
mod tests;
