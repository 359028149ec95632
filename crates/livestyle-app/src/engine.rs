//! Engine - the single owner of LiveStyle's mutable state
//!
//! The Engine owns the store, the transaction manager, the diff queue and the
//! resource host channels. Everything reaches it as a [`Message`] on one
//! channel and is processed one message at a time, so a transaction never
//! observes a half-applied action. Work that has to wait (timers, host
//! requests, diff engine calls) is spawned by [`crate::actions`] and reports
//! back on the same channel.

use std::sync::Arc;

use tokio::sync::mpsc;

use livestyle_core::prelude::*;
use livestyle_core::{render_patches, Diff, Patch, TabId};
use livestyle_host::{ChannelRegistry, DiffEngine, HostNotification, ResourceChannel};

use crate::action::Action;
use crate::actions;
use crate::config::Settings;
use crate::diff_queue::DiffQueue;
use crate::message::{Message, Outgoing};
use crate::persistence::{PersistedState, StateSaver};
use crate::reducers::reduce;
use crate::router::{self, PatchRoute};
use crate::state::AppState;
use crate::subscribers::{self, AppStore};
use crate::transaction::{TransactionManager, TxEffect, TxEvent, TxKey};

/// Orchestration engine for LiveStyle.
///
/// Owns:
/// - The state store and its subscribers
/// - Per-resource patch transactions
/// - Browser-side diff windows and content baselines
/// - Connected resource host channels
/// - The message channel everything reports back on
pub struct Engine<D> {
    /// Application state store with subscribers installed
    store: AppStore,

    /// Patch transaction state machines, one per `(tab, url)`
    transactions: TransactionManager,

    /// Browser edit debouncing and last known resource contents
    diffs: DiffQueue,

    /// Resource host channel per tab
    channels: ChannelRegistry,

    /// External diff/patch engine
    diff_engine: Arc<D>,

    /// Loaded settings
    settings: Settings,

    /// Page persistence. None when persistence is disabled.
    saver: Option<StateSaver>,

    /// Sender half of the message channel.
    /// Clone this to give to transports and spawned tasks.
    msg_tx: mpsc::UnboundedSender<Message>,

    /// Receiver half of the message channel
    msg_rx: mpsc::UnboundedReceiver<Message>,

    /// Messages for the editor and the browser, delivered by the transport
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl<D> std::fmt::Debug for Engine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", self.store.state())
            .field("transactions", &self.transactions)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

impl<D> Engine<D>
where
    D: DiffEngine + Sync + 'static,
{
    /// Create an engine with an empty state.
    ///
    /// `outgoing` receives everything the engine wants delivered to the
    /// editor or the browser.
    pub fn new(settings: Settings, diff_engine: D, outgoing: mpsc::UnboundedSender<Outgoing>) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();

        let mut store = AppStore::new(AppState::default(), reduce);
        subscribers::install(&mut store, &msg_tx);

        Self {
            store,
            transactions: TransactionManager::new(settings.timing.patch_debounce()),
            diffs: DiffQueue::new(settings.timing.diff_debounce()),
            channels: ChannelRegistry::new(),
            diff_engine: Arc::new(diff_engine),
            settings,
            saver: None,
            msg_tx,
            msg_rx,
            outgoing,
        }
    }

    /// Persist page changes through `saver`
    pub fn with_saver(mut self, saver: StateSaver) -> Self {
        self.saver = Some(saver);
        self
    }

    /// Sender for transports feeding the engine
    pub fn msg_sender(&self) -> mpsc::UnboundedSender<Message> {
        self.msg_tx.clone()
    }

    pub fn state(&self) -> &Arc<AppState> {
        self.store.state()
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn diff_queue(&self) -> &DiffQueue {
        &self.diffs
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Dispatch a store action directly
    pub fn dispatch(&mut self, action: Action) {
        self.store.dispatch(action);
    }

    /// Merge previously persisted pages into the state
    pub fn restore(&mut self, persisted: PersistedState) {
        let pages = persisted.into_pages();
        info!("Restoring {} persisted page(s)", pages.len());
        self.store.dispatch(Action::LoadPersisted(pages));
    }

    /// Process messages until [`Message::Shutdown`]
    pub async fn run(&mut self) {
        info!("LiveStyle engine started");
        while let Some(msg) = self.msg_rx.recv().await {
            if matches!(msg, Message::Shutdown) {
                self.shutdown();
                break;
            }
            self.process_message(msg);
        }
        info!("LiveStyle engine stopped");
    }

    /// Drain and process all pending messages from the channel.
    ///
    /// Returns the number of messages processed.
    pub fn drain_pending_messages(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg);
            count += 1;
        }
        count
    }

    #[cfg(test)]
    pub(crate) async fn recv(&mut self) -> Option<Message> {
        self.msg_rx.recv().await
    }

    /// Process a single message
    pub fn process_message(&mut self, msg: Message) {
        match msg {
            // Host
            Message::TabsChanged(tabs) => self.store.dispatch(Action::SetTabs(tabs)),
            Message::TabUpdated(tab) => self.store.dispatch(Action::TabUpdated(tab)),
            Message::TabClosed(tab) => self.store.dispatch(Action::TabClosed(tab)),
            Message::ChannelConnected(channel) => self.handle_channel_connected(channel),
            Message::ChannelDisconnected(tab) => self.handle_channel_disconnected(tab),
            Message::ChannelInbound { tab, message } => {
                let notification = match self.channels.get(tab) {
                    Ok(channel) => channel.handle_incoming(message),
                    Err(e) => {
                        debug!("Dropping '{}' message: {}", message.action, e);
                        return;
                    }
                };
                match notification {
                    Some(Ok(notification)) => self.handle_notification(tab, notification),
                    Some(Err(e)) => warn!("Bad message from tab {}: {}", tab, e),
                    None => {}
                }
            }
            Message::CssomStylesheets { tab, stylesheets } => self
                .store
                .dispatch(Action::SetCssomStylesheets { tab, stylesheets }),
            Message::UserStylesheets { tab, stylesheets } => self
                .store
                .dispatch(Action::SetUserStylesheets { tab, stylesheets }),

            // Editor
            Message::EditorDiff(diff) => self.handle_editor_diff(diff),
            Message::EditorFiles(files) => self.store.dispatch(Action::SetEditorFiles(files)),
            Message::Action(action) => self.store.dispatch(action),

            // Internal
            Message::SessionsChanged { created, destroyed } => {
                self.handle_sessions_changed(created, destroyed)
            }
            Message::RequestTransaction(key) => {
                if !self.channels.is_connected(key.tab) {
                    debug!("Holding patches for {} until its resource host connects", key);
                    return;
                }
                let effects = self.transactions.request(key);
                self.execute(effects);
            }
            Message::Transaction(event) => self.handle_transaction_event(event),
            Message::BaselineFetched { key, result } => match result {
                Ok(content) => {
                    if self.diffs.content(&key).is_none() {
                        self.diffs.set_content(key, content);
                    }
                }
                Err(e) => debug!("Could not read baseline of {}: {}", key, e),
            },
            Message::DiffWindowElapsed { key, generation } => {
                if let Some(job) = self.diffs.elapsed(&key, generation) {
                    actions::spawn_calculate_diff(
                        self.diff_engine.clone(),
                        job,
                        self.settings.timing.engine_timeout(),
                        self.msg_tx.clone(),
                    );
                }
            }
            Message::DiffComputed { key, result } => match result {
                Ok(patches) => self.handle_browser_diff(key, patches),
                Err(e) => warn!("Diff of {} failed: {}", key, e),
            },
            Message::StylesheetsFetched { tab, result } => match result {
                Ok(stylesheets) => self.handle_stylesheets_fetched(tab, stylesheets),
                Err(e) => warn!("Could not list stylesheets of tab {}: {}", tab, e),
            },
            Message::RequestUnsavedFiles { files } => {
                self.send_outgoing(Outgoing::RequestUnsavedFiles { files })
            }
            Message::PersistPages(pages) => {
                if let Some(saver) = &self.saver {
                    saver.schedule_save(PersistedState::from_pages(&pages));
                }
            }
            Message::Shutdown => self.shutdown(),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Resource host
    // ─────────────────────────────────────────────────────────

    fn handle_channel_connected(&mut self, channel: ResourceChannel) {
        let tab = channel.tab();
        info!("Resource host connected for tab {}", tab);
        self.channels
            .connect(channel.with_timeout(self.settings.timing.request_timeout()));

        let Some(session) = self.store.state().session(tab).cloned() else {
            return;
        };
        self.fetch_stylesheets(tab);

        // Patches queued while no host was connected
        let queued: Vec<TxKey> = session
            .patches
            .iter()
            .filter(|(_, patches)| !patches.is_empty())
            .map(|(url, _)| TxKey::new(tab, url))
            .collect();
        for key in queued {
            let effects = self.transactions.request(key);
            self.execute(effects);
        }
    }

    fn handle_channel_disconnected(&mut self, tab: TabId) {
        if self.channels.disconnect(tab).is_none() {
            return;
        }
        info!("Resource host disconnected for tab {}", tab);
        self.store.dispatch(Action::SetDevtoolsStylesheets {
            tab,
            stylesheets: None,
        });
    }

    fn handle_notification(&mut self, tab: TabId, notification: HostNotification) {
        match notification {
            HostNotification::ResourceUpdated { url, content } => {
                let key = TxKey::new(tab, url);
                if self.transactions.is_locked(&key) {
                    trace!("Ignoring echo of our own write to {}", key);
                    self.diffs.set_content(key, content);
                    return;
                }
                if self.store.state().session(tab).is_none() {
                    trace!("Ignoring update of {}: no session", key);
                    return;
                }
                let timer = self.diffs.push(key, content);
                actions::spawn_timer(
                    timer.delay,
                    Message::DiffWindowElapsed {
                        key: timer.key,
                        generation: timer.generation,
                    },
                    self.msg_tx.clone(),
                );
            }
            HostNotification::ResourceAdded { url } => {
                if self.store.state().session(tab).is_none() {
                    return;
                }
                debug!("Stylesheet {} added in tab {}", url, tab);
                self.store.dispatch(Action::AddDevtoolsStylesheet {
                    tab,
                    url: url.clone(),
                });
                self.fetch_baseline(TxKey::new(tab, url));
            }
            HostNotification::ActivityState { active: true } => {
                if self.store.state().session(tab).is_some() {
                    self.fetch_stylesheets(tab);
                }
            }
            HostNotification::ActivityState { active: false } => {
                self.store.dispatch(Action::SetDevtoolsStylesheets {
                    tab,
                    stylesheets: None,
                });
            }
        }
    }

    fn handle_stylesheets_fetched(&mut self, tab: TabId, stylesheets: Vec<String>) {
        if self.store.state().session(tab).is_none() {
            trace!("Dropping stylesheet list of tab {}: no session", tab);
            return;
        }
        for url in &stylesheets {
            let key = TxKey::new(tab, url);
            if self.diffs.content(&key).is_none() {
                self.fetch_baseline(key);
            }
        }
        self.store.dispatch(Action::SetDevtoolsStylesheets {
            tab,
            stylesheets: Some(stylesheets),
        });
    }

    fn fetch_stylesheets(&self, tab: TabId) {
        if let Ok(channel) = self.channels.get(tab) {
            actions::spawn_fetch_stylesheets(channel.clone(), self.msg_tx.clone());
        }
    }

    fn fetch_baseline(&self, key: TxKey) {
        if let Ok(channel) = self.channels.get(key.tab) {
            actions::spawn_fetch_baseline(channel.clone(), key, self.msg_tx.clone());
        }
    }

    fn handle_sessions_changed(&mut self, created: Vec<TabId>, destroyed: Vec<TabId>) {
        for tab in destroyed {
            debug!("Session of tab {} ended", tab);
            self.transactions.forget_tab(tab);
            self.diffs.forget_tab(tab);
        }
        for tab in created {
            debug!("Session of tab {} started", tab);
            self.fetch_stylesheets(tab);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Diff routing
    // ─────────────────────────────────────────────────────────

    fn handle_editor_diff(&mut self, diff: Diff) {
        trace!("Editor diff for {}:\n{}", diff.uri, render_patches(&diff.patches));
        let routes = router::route_editor_diff(self.store.state(), &diff);
        if routes.is_empty() {
            debug!("No session maps editor file {}", diff.uri);
        }
        for route in routes {
            self.queue_route(route);
        }
    }

    fn handle_browser_diff(&mut self, key: TxKey, patches: Vec<Patch>) {
        if patches.is_empty() {
            trace!("Empty diff for {}", key);
            return;
        }
        trace!("Browser diff for {}:\n{}", key, render_patches(&patches));
        let route = match router::route_browser_diff(self.store.state(), key.tab, &key.url, &patches) {
            Ok(route) => route,
            Err(e) => {
                debug!("Dropping diff of {}: {}", key, e);
                return;
            }
        };
        if let Some(diff) = route.editor {
            self.send_outgoing(Outgoing::EditorDiff(diff));
        }
        for route in route.tabs {
            self.queue_route(route);
        }
    }

    /// Live-apply to the tab's CSSOM and queue for its resource transaction
    fn queue_route(&mut self, route: PatchRoute) {
        let action = route.queue_action();
        self.send_outgoing(Outgoing::CssomPatches {
            tab: route.tab,
            url: route.uri,
            patches: route.patches,
        });
        self.store.dispatch(action);
    }

    // ─────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────

    fn handle_transaction_event(&mut self, event: TxEvent) {
        if let TxEvent::ContentFetched {
            key,
            result: Ok(content),
        } = &event
        {
            self.diffs.set_content(key.clone(), content.clone());
        }
        let state = self.store.state().clone();
        let effects = self.transactions.handle(event, &state);
        self.execute(effects);
    }

    fn execute(&mut self, effects: Vec<TxEffect>) {
        for effect in effects {
            match effect {
                TxEffect::StartDebounce {
                    key,
                    generation,
                    delay,
                } => actions::spawn_timer(
                    delay,
                    Message::Transaction(TxEvent::DebounceElapsed { key, generation }),
                    self.msg_tx.clone(),
                ),
                TxEffect::FetchContent { key } => match self.channels.get(key.tab) {
                    Ok(channel) => {
                        actions::spawn_fetch_content(channel.clone(), key, self.msg_tx.clone())
                    }
                    Err(e) => self.send_self(Message::Transaction(TxEvent::ContentFetched {
                        key,
                        result: Err(e),
                    })),
                },
                TxEffect::ApplyPatches {
                    key,
                    content,
                    patches,
                } => actions::spawn_apply_patches(
                    self.diff_engine.clone(),
                    key,
                    content,
                    patches,
                    self.settings.timing.engine_timeout(),
                    self.msg_tx.clone(),
                ),
                TxEffect::Dispatch(action) => self.store.dispatch(action),
                TxEffect::WriteBack { key, content } => match self.channels.get(key.tab) {
                    Ok(channel) => {
                        actions::spawn_write_back(channel.clone(), key, content, self.msg_tx.clone())
                    }
                    Err(e) => self.send_self(Message::Transaction(TxEvent::WriteBackDone {
                        key,
                        result: Err(e),
                    })),
                },
                TxEffect::Committed { key, content } => self.diffs.set_content(key, content),
                TxEffect::ContentUnknown { key } => {
                    self.diffs.forget_content(&key);
                    self.fetch_baseline(key);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Plumbing
    // ─────────────────────────────────────────────────────────

    fn send_self(&self, msg: Message) {
        // the engine holds the receiver, so this only fails during teardown
        let _ = self.msg_tx.send(msg);
    }

    fn send_outgoing(&self, msg: Outgoing) {
        if self.outgoing.send(msg).is_err() {
            warn!("Transport gone, dropping outgoing message");
        }
    }

    fn shutdown(&mut self) {
        if let Some(saver) = &self.saver {
            if let Err(e) = saver.flush() {
                error!("Failed to save state on shutdown: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests;
