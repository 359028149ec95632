use std::time::Duration;

use serde_json::json;

use livestyle_core::Tab;
use livestyle_host::test_utils::{fake_apply, FakeDiffEngine, FakeResourceHost};
use livestyle_host::{action, ChannelMessage};

use super::*;
use crate::transaction::TxPhase;

const PAGE: &str = "http://localhost/index.html";
const CSS: &str = "http://localhost/css/style.css";
const EDITOR_FILE: &str = "/project/css/style.css";
const BASE: &str = "body { margin: 0 }";

fn patch(selector: &str, color: &str) -> Patch {
    Patch::update([selector]).set("color", color)
}

fn key() -> TxKey {
    TxKey::new(TabId(1), CSS)
}

struct Harness {
    engine: Engine<FakeDiffEngine>,
    diff_engine: FakeDiffEngine,
    host: FakeResourceHost,
    outgoing: mpsc::UnboundedReceiver<Outgoing>,
}

impl Harness {
    /// Engine with tab 1 open on an enabled page, its resource host
    /// connected and `CSS` mapped to `EDITOR_FILE`
    async fn new(diff_engine: FakeDiffEngine, host: FakeResourceHost) -> Self {
        let (out_tx, outgoing) = mpsc::unbounded_channel();
        let engine = Engine::new(Settings::default(), diff_engine.clone(), out_tx);

        let mut harness = Self {
            engine,
            diff_engine,
            host,
            outgoing,
        };
        harness.connect_host();
        harness
            .engine
            .process_message(Message::EditorFiles(vec![EDITOR_FILE.into()]));
        harness
            .engine
            .process_message(Message::TabsChanged(vec![Tab::new(1, PAGE)]));
        harness
            .engine
            .process_message(Message::Action(Action::EnablePage { url: PAGE.into() }));
        harness.run_for(Duration::from_millis(100)).await;
        harness
    }

    /// Open a fresh channel from tab 1 to the resource host
    fn connect_host(&mut self) {
        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        let msg_tx = self.engine.msg_sender();
        self.host.serve(channel_rx, move |message| {
            let _ = msg_tx.send(Message::ChannelInbound {
                tab: TabId(1),
                message,
            });
        });
        self.engine
            .process_message(Message::ChannelConnected(ResourceChannel::new(
                TabId(1),
                channel_tx,
            )));
    }

    /// Drop tab 1's channel; the content script keeps reporting `CSS` so the
    /// mapping survives
    fn disconnect_host(&mut self) {
        self.engine.process_message(Message::CssomStylesheets {
            tab: TabId(1),
            stylesheets: Some(vec![CSS.into()]),
        });
        self.engine
            .process_message(Message::ChannelDisconnected(TabId(1)));
    }

    fn queued(&self) -> Vec<Patch> {
        self.engine
            .state()
            .queued_patches(TabId(1), CSS)
            .map(|patches| patches.to_vec())
            .unwrap_or_default()
    }

    /// Process messages as they arrive until `duration` of (paused) time passed
    async fn run_for(&mut self, duration: Duration) {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            tokio::select! {
                Some(msg) = self.engine.recv() => self.engine.process_message(msg),
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }
    }

    fn outgoing(&mut self) -> Vec<Outgoing> {
        let mut out = Vec::new();
        while let Ok(msg) = self.outgoing.try_recv() {
            out.push(msg);
        }
        out
    }

    fn editor_diff(&mut self, patches: Vec<Patch>) {
        self.engine
            .process_message(Message::EditorDiff(Diff::new(EDITOR_FILE, patches)));
    }

    fn browser_edit(&mut self, content: &str) {
        self.engine.process_message(Message::ChannelInbound {
            tab: TabId(1),
            message: ChannelMessage::new(
                action::RESOURCE_UPDATED,
                json!({ "url": CSS, "content": content }),
            ),
        });
    }

    fn queue_is_empty(&self) -> bool {
        self.engine
            .state()
            .queued_patches(TabId(1), CSS)
            .map_or(true, |patches| patches.is_empty())
    }
}

#[tokio::test(start_paused = true)]
async fn test_setup_maps_stylesheet_and_requests_unsaved_file() {
    let mut h = Harness::new(FakeDiffEngine::new(), FakeResourceHost::new([(CSS, BASE)])).await;

    let session = h.engine.state().session(TabId(1)).cloned().unwrap();
    assert_eq!(*session.stylesheets, vec![CSS.to_string()]);
    assert_eq!(session.mapping[CSS], EDITOR_FILE);
    assert_eq!(h.engine.diff_queue().content(&key()), Some(BASE));

    assert!(h.outgoing().contains(&Outgoing::RequestUnsavedFiles {
        files: vec![EDITOR_FILE.to_string()]
    }));
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_editor_diffs_commits_once() {
    let mut h = Harness::new(FakeDiffEngine::new(), FakeResourceHost::new([(CSS, BASE)])).await;
    h.outgoing();

    let patches = vec![
        patch("a", "red"),
        patch("b", "blue"),
        patch("c", "green"),
    ];
    for p in &patches {
        h.editor_diff(vec![p.clone()]);
        h.run_for(Duration::from_millis(200)).await;
    }
    h.run_for(Duration::from_secs(3)).await;

    assert_eq!(
        h.host.writes(),
        vec![(CSS.to_string(), fake_apply(BASE, &patches))]
    );
    assert_eq!(h.diff_engine.patch_calls().len(), 1);
    assert!(h.queue_is_empty());
    assert_eq!(h.engine.transactions().phase(&key()), TxPhase::Idle);
    assert!(!h.engine.transactions().is_locked(&key()));

    // every diff was also live-applied to the CSSOM
    let live = h
        .outgoing()
        .into_iter()
        .filter(|msg| matches!(msg, Outgoing::CssomPatches { url, .. } if url == CSS))
        .count();
    assert_eq!(live, 3);
}

#[tokio::test(start_paused = true)]
async fn test_patch_queued_during_apply_is_not_lost() {
    let diff_engine = FakeDiffEngine::new().with_delay(Duration::from_secs(2));
    let mut h = Harness::new(diff_engine, FakeResourceHost::new([(CSS, BASE)])).await;

    let mut patches = vec![
        patch("a", "red"),
        patch("b", "blue"),
        patch("c", "green"),
    ];
    for p in &patches {
        h.editor_diff(vec![p.clone()]);
    }
    h.run_for(Duration::from_millis(1500)).await;
    assert_eq!(h.engine.transactions().phase(&key()), TxPhase::Applying);

    let late = patch("d", "black");
    patches.push(late.clone());
    h.editor_diff(vec![late]);
    h.run_for(Duration::from_secs(10)).await;

    // the first attempt is abandoned; the second covers all four
    assert_eq!(
        h.host.writes(),
        vec![(CSS.to_string(), fake_apply(BASE, &patches))]
    );
    let calls = h.diff_engine.patch_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].patches.len(), 3);
    assert_eq!(calls[1].patches, patches);
    assert!(h.queue_is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_echo_of_own_write_is_not_diffed() {
    let host = FakeResourceHost::new([(CSS, BASE)]).echoing_updates();
    let mut h = Harness::new(FakeDiffEngine::new(), host).await;
    h.outgoing();

    let patches = vec![patch("a", "red")];
    h.editor_diff(patches.clone());
    h.run_for(Duration::from_secs(3)).await;

    assert_eq!(h.host.writes().len(), 1);
    assert!(h.diff_engine.diff_calls().is_empty());
    assert!(!h
        .outgoing()
        .iter()
        .any(|msg| matches!(msg, Outgoing::EditorDiff(_))));
    assert_eq!(
        h.engine.diff_queue().content(&key()),
        Some(fake_apply(BASE, &patches).as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn test_browser_edit_burst_produces_one_editor_diff() {
    let mut h = Harness::new(FakeDiffEngine::new(), FakeResourceHost::new([(CSS, BASE)])).await;
    h.outgoing();

    h.browser_edit("body { margin: 1px }");
    h.run_for(Duration::from_millis(50)).await;
    h.browser_edit("body { margin: 2px }");
    h.run_for(Duration::from_secs(1)).await;

    let calls = h.diff_engine.diff_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].previous, BASE);
    assert_eq!(calls[0].content, "body { margin: 2px }");

    let diffs: Vec<Diff> = h
        .outgoing()
        .into_iter()
        .filter_map(|msg| match msg {
            Outgoing::EditorDiff(diff) => Some(diff),
            _ => None,
        })
        .collect();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].uri, EDITOR_FILE);
}

#[tokio::test(start_paused = true)]
async fn test_to_browser_only_page_does_not_reach_editor() {
    let mut h = Harness::new(FakeDiffEngine::new(), FakeResourceHost::new([(CSS, BASE)])).await;
    h.engine.process_message(Message::Action(Action::SetDirection {
        url: PAGE.into(),
        direction: livestyle_core::Direction::ToBrowser,
    }));
    h.outgoing();

    h.browser_edit("body { margin: 1px }");
    h.run_for(Duration::from_secs(1)).await;

    assert_eq!(h.diff_engine.diff_calls().len(), 1);
    assert!(h.outgoing().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_patches_wait_for_host_channel() {
    let mut h = Harness::new(FakeDiffEngine::new(), FakeResourceHost::new([(CSS, BASE)])).await;
    h.disconnect_host();
    assert_eq!(h.engine.state().session(TabId(1)).unwrap().mapping[CSS], EDITOR_FILE);

    h.editor_diff(vec![patch("a", "red")]);
    h.run_for(Duration::from_secs(3)).await;
    assert!(h.host.writes().is_empty());
    assert!(!h.queue_is_empty());
    assert_eq!(h.engine.transactions().phase(&key()), TxPhase::Idle);

    h.connect_host();
    h.run_for(Duration::from_secs(3)).await;

    assert_eq!(h.host.writes().len(), 1);
    assert!(h.queue_is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_write_back_keeps_patches_and_baseline() {
    let host = FakeResourceHost::new([(CSS, BASE)]);
    host.set_drop_writes(true);
    let mut h = Harness::new(FakeDiffEngine::new(), host).await;
    h.outgoing();

    let patches = vec![patch("a", "red")];
    h.editor_diff(patches.clone());
    h.run_for(Duration::from_secs(3)).await;
    assert_eq!(h.engine.transactions().phase(&key()), TxPhase::Committing);
    assert!(h.engine.transactions().is_locked(&key()));
    assert!(h.queue_is_empty());

    // the host goes away before acknowledging the write
    h.disconnect_host();
    h.run_for(Duration::from_secs(3)).await;

    assert_eq!(h.queued(), patches);
    assert_eq!(h.engine.transactions().phase(&key()), TxPhase::Idle);
    assert!(!h.engine.transactions().is_locked(&key()));
    assert_ne!(
        h.engine.diff_queue().content(&key()),
        Some(fake_apply(BASE, &patches).as_str())
    );

    // back online, the user edits the resource that never got the write
    h.host.set_drop_writes(false);
    h.connect_host();
    h.run_for(Duration::from_millis(100)).await;
    assert_eq!(h.engine.diff_queue().content(&key()), Some(BASE));

    h.browser_edit("body { margin: 1px }");
    h.run_for(Duration::from_millis(500)).await;
    let calls = h.diff_engine.diff_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].previous, BASE);

    h.run_for(Duration::from_secs(3)).await;
    assert_eq!(
        h.host.writes(),
        vec![(CSS.to_string(), fake_apply(BASE, &patches))]
    );
    assert!(h.queue_is_empty());
    assert_eq!(
        h.engine.diff_queue().content(&key()),
        h.host.content(CSS).as_deref()
    );
}

#[tokio::test(start_paused = true)]
async fn test_closing_tab_forgets_transactions() {
    let diff_engine = FakeDiffEngine::new().with_delay(Duration::from_secs(2));
    let mut h = Harness::new(diff_engine, FakeResourceHost::new([(CSS, BASE)])).await;

    h.editor_diff(vec![patch("a", "red")]);
    h.run_for(Duration::from_millis(1500)).await;
    assert_eq!(h.engine.transactions().active_count(), 1);

    h.engine.process_message(Message::TabClosed(TabId(1)));
    h.run_for(Duration::from_secs(5)).await;

    assert!(h.engine.state().sessions.is_empty());
    assert_eq!(h.engine.transactions().active_count(), 0);
    assert!(h.host.writes().is_empty());
    assert_eq!(h.engine.diff_queue().content(&key()), None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_pending_pages() {
    let temp = tempfile::TempDir::new().unwrap();
    let file = crate::persistence::StateFile::new(temp.path().join("state.json"));
    let saver = StateSaver::new(file.clone(), Duration::from_secs(60));

    let (out_tx, _outgoing) = mpsc::unbounded_channel();
    let mut engine =
        Engine::new(Settings::default(), FakeDiffEngine::new(), out_tx).with_saver(saver);
    engine.process_message(Message::Action(Action::EnablePage { url: PAGE.into() }));
    engine.drain_pending_messages();
    assert!(!file.path().exists());

    engine.msg_sender().send(Message::Shutdown).unwrap();
    engine.run().await;

    let pages = file.load().unwrap().unwrap().into_pages();
    assert!(pages[PAGE].enabled);
}
