use super::*;

use livestyle_core::{Patch, Tab};

use crate::reducers::reduce;

const PAGE: &str = "http://localhost/index.html";

fn setup() -> (AppStore, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut store = Store::new(AppState::default(), reduce);
    install(&mut store, &tx);
    (store, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Store with an enabled page open in tab 1
fn with_session() -> (AppStore, mpsc::UnboundedReceiver<Message>) {
    let (mut store, mut rx) = setup();
    store.dispatch(Action::SetTabs(vec![Tab::new(1, PAGE)]));
    store.dispatch(Action::EnablePage { url: PAGE.into() });
    drain(&mut rx);
    (store, rx)
}

fn session(store: &AppStore) -> Arc<Session> {
    store.state().session(TabId(1)).cloned().unwrap()
}

#[test]
fn test_enabling_page_creates_session() {
    let (mut store, mut rx) = setup();
    store.dispatch(Action::SetTabs(vec![Tab::new(1, PAGE), Tab::new(2, "http://x/")]));
    assert!(store.state().sessions.is_empty());

    store.dispatch(Action::EnablePage { url: PAGE.into() });
    assert_eq!(store.state().sessions.len(), 1);

    let created = drain(&mut rx).into_iter().any(|msg| {
        matches!(msg, Message::SessionsChanged { created, .. } if created == vec![TabId(1)])
    });
    assert!(created);
}

#[test]
fn test_disabling_page_destroys_session() {
    let (mut store, mut rx) = with_session();
    store.dispatch(Action::DisablePage { url: PAGE.into() });

    assert!(store.state().sessions.is_empty());
    let destroyed = drain(&mut rx).into_iter().any(|msg| {
        matches!(msg, Message::SessionsChanged { destroyed, .. } if destroyed == vec![TabId(1)])
    });
    assert!(destroyed);
}

#[test]
fn test_reconcile_twice_preserves_identity() {
    let (mut store, _rx) = with_session();
    store.dispatch(Action::ReconcileSessions);
    let before = store.state().sessions.clone();
    store.dispatch(Action::ReconcileSessions);
    assert!(Arc::ptr_eq(&before, &store.state().sessions));
}

#[test]
fn test_stylesheet_union_and_mapping_scenario() {
    let (mut store, _rx) = with_session();
    store.dispatch(Action::SetEditorFiles(strings(&[
        "/assets/css/file1.css",
        "/src/css2/file2.css",
    ])));
    store.dispatch(Action::SetCssomStylesheets {
        tab: TabId(1),
        stylesheets: Some(strings(&["/assets/css/file1.css"])),
    });
    store.dispatch(Action::SetDevtoolsStylesheets {
        tab: TabId(1),
        stylesheets: Some(strings(&["/assets/css/file1.css", "/assets/css/file2.css"])),
    });

    let session = session(&store);
    assert_eq!(
        *session.stylesheets,
        strings(&["/assets/css/file1.css", "/assets/css/file2.css"])
    );
    assert_eq!(
        *session.mapping,
        Mapping::from([
            ("/assets/css/file1.css".into(), "/assets/css/file1.css".into()),
            ("/assets/css/file2.css".into(), "/src/css2/file2.css".into()),
        ])
    );
}

#[test]
fn test_stale_user_override_is_filtered() {
    let (mut store, _rx) = with_session();
    store.dispatch(Action::SetUserMapping {
        url: PAGE.into(),
        browser: "/a.css".into(),
        editor: Some("/missing-editor-file.css".into()),
    });
    store.dispatch(Action::SetEditorFiles(strings(&["/src/a.css"])));
    store.dispatch(Action::SetCssomStylesheets {
        tab: TabId(1),
        stylesheets: Some(strings(&["/a.css"])),
    });

    assert_eq!(
        *session(&store).mapping,
        Mapping::from([("/a.css".into(), "/src/a.css".into())])
    );

    // Opening the override target makes the override win
    store.dispatch(Action::SetEditorFiles(strings(&[
        "/src/a.css",
        "/missing-editor-file.css",
    ])));
    assert_eq!(session(&store).mapping["/a.css"], "/missing-editor-file.css");
}

#[test]
fn test_mapping_filter_invariant_after_files_close() {
    let (mut store, _rx) = with_session();
    store.dispatch(Action::SetEditorFiles(strings(&["/src/a.css", "/src/b.css"])));
    store.dispatch(Action::SetCssomStylesheets {
        tab: TabId(1),
        stylesheets: Some(strings(&["/a.css", "/b.css"])),
    });
    assert_eq!(session(&store).mapping.len(), 2);

    store.dispatch(Action::SetEditorFiles(strings(&["/src/a.css"])));
    store.dispatch(Action::SetCssomStylesheets {
        tab: TabId(1),
        stylesheets: Some(strings(&["/b.css"])),
    });

    let session = session(&store);
    for (browser, editor) in session.mapping.iter() {
        assert!(session.stylesheets.contains(browser));
        assert!(store.state().editor_files.contains(editor));
    }
    assert!(session.mapping.is_empty());
}

#[test]
fn test_queued_patches_request_transaction() {
    let (mut store, mut rx) = with_session();
    let queue = Action::QueuePatches {
        tab: TabId(1),
        uri: "/a.css".into(),
        patches: vec![Patch::update(["a"]).set("color", "red")],
    };
    store.dispatch(queue.clone());
    store.dispatch(queue);

    let requests = drain(&mut rx)
        .into_iter()
        .filter(|msg| matches!(msg, Message::RequestTransaction(key) if key.url == "/a.css"))
        .count();
    assert_eq!(requests, 2);

    store.dispatch(Action::ClearPatches {
        tab: TabId(1),
        uri: "/a.css".into(),
    });
    assert!(!drain(&mut rx)
        .iter()
        .any(|msg| matches!(msg, Message::RequestTransaction(_))));
}

#[test]
fn test_unsaved_files_requested_once() {
    let (mut store, mut rx) = with_session();
    store.dispatch(Action::SetEditorFiles(strings(&["/src/a.css"])));
    store.dispatch(Action::SetCssomStylesheets {
        tab: TabId(1),
        stylesheets: Some(strings(&["/a.css"])),
    });
    store.dispatch(Action::SetCssomStylesheets {
        tab: TabId(1),
        stylesheets: None,
    });
    store.dispatch(Action::SetCssomStylesheets {
        tab: TabId(1),
        stylesheets: Some(strings(&["/a.css"])),
    });

    let requests: Vec<Vec<String>> = drain(&mut rx)
        .into_iter()
        .filter_map(|msg| match msg {
            Message::RequestUnsavedFiles { files } => Some(files),
            _ => None,
        })
        .collect();
    assert_eq!(requests, vec![strings(&["/src/a.css"])]);
    assert!(session(&store).requested_unsaved_files.contains("/src/a.css"));
}

#[test]
fn test_page_changes_are_persisted() {
    let (mut store, mut rx) = with_session();
    store.dispatch(Action::SetDirection {
        url: PAGE.into(),
        direction: livestyle_core::Direction::ToEditor,
    });

    let persisted = drain(&mut rx)
        .into_iter()
        .any(|msg| matches!(msg, Message::PersistPages(pages) if pages.contains_key(PAGE)));
    assert!(persisted);
}

#[test]
fn test_load_persisted_current_pages_win() {
    let (mut store, _rx) = with_session();
    let restored = crate::state::PageMap::from([(
        PAGE.to_string(),
        Arc::new(livestyle_core::Page::default()),
    )]);
    store.dispatch(Action::LoadPersisted(restored));

    assert!(store.state().pages[PAGE].enabled);
    assert_eq!(store.state().sessions.len(), 1);
}
