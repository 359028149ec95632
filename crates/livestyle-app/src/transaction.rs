//! Patch transaction manager
//!
//! Applies the patches queued for a browser resource to that resource's
//! content in the developer-tools resource model. One transaction per
//! `(tab, url)` key at a time:
//!
//! ```text
//! Idle ─request─▶ DebouncePending ─elapsed─▶ Fetching ─content─▶ Applying
//!                   ▲    │ request (restart)                        │ patched
//!                   │    ▼                                          ▼
//!                   └── drain ◀── write-back done ◀── Committing ◀─ verify
//! ```
//!
//! When fetching starts, the queued patch list is recorded as the snapshot.
//! Once patched content comes back, the snapshot is compared by reference
//! with the list now in the store: if new patches arrived meanwhile the
//! attempt is abandoned without writing, and draining starts a fresh one
//! covering everything queued.
//!
//! The manager performs no I/O. Transitions return [`TxEffect`]s for the
//! engine to execute, and results come back as [`TxEvent`]s.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use livestyle_core::prelude::*;
use livestyle_core::{render_patches, Patch, TabId};

use crate::action::Action;
use crate::state::AppState;

/// Default debounce before a transaction starts
pub const DEFAULT_PATCH_DEBOUNCE: Duration = Duration::from_millis(1000);

/// A browser resource of one tab
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxKey {
    pub tab: TabId,
    pub url: String,
}

impl TxKey {
    pub fn new(tab: TabId, url: impl Into<String>) -> Self {
        Self {
            tab,
            url: url.into(),
        }
    }
}

impl fmt::Display for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ tab {}", self.url, self.tab)
    }
}

/// Observable phase of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    Idle,
    DebouncePending,
    Fetching,
    Applying,
    Committing,
}

#[derive(Debug, Clone)]
enum TxState {
    DebouncePending { generation: u64 },
    Fetching { snapshot: Arc<Vec<Patch>> },
    Applying { snapshot: Arc<Vec<Patch>> },
    Committing {
        snapshot: Arc<Vec<Patch>>,
        content: String,
    },
}

impl TxState {
    fn phase(&self) -> TxPhase {
        match self {
            TxState::DebouncePending { .. } => TxPhase::DebouncePending,
            TxState::Fetching { .. } => TxPhase::Fetching,
            TxState::Applying { .. } => TxPhase::Applying,
            TxState::Committing { .. } => TxPhase::Committing,
        }
    }
}

/// Work the engine performs on the manager's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum TxEffect {
    /// Report [`TxEvent::DebounceElapsed`] after `delay`
    StartDebounce {
        key: TxKey,
        generation: u64,
        delay: Duration,
    },
    /// Read the resource's current content
    FetchContent { key: TxKey },
    /// Ask the diff engine to apply `patches` to `content`
    ApplyPatches {
        key: TxKey,
        content: String,
        patches: Arc<Vec<Patch>>,
    },
    /// Dispatch a store action
    Dispatch(Action),
    /// Replace the resource's content
    WriteBack { key: TxKey, content: String },
    /// The host acknowledged the write: the resource now holds `content`
    Committed { key: TxKey, content: String },
    /// A write may or may not have landed; what the resource holds is unknown
    ContentUnknown { key: TxKey },
}

/// Outcome of an effect, fed back into [`TransactionManager::handle`]
#[derive(Debug)]
pub enum TxEvent {
    DebounceElapsed { key: TxKey, generation: u64 },
    ContentFetched { key: TxKey, result: Result<String> },
    PatchesApplied { key: TxKey, result: Result<String> },
    WriteBackDone { key: TxKey, result: Result<()> },
}

impl TxEvent {
    pub fn key(&self) -> &TxKey {
        match self {
            TxEvent::DebounceElapsed { key, .. }
            | TxEvent::ContentFetched { key, .. }
            | TxEvent::PatchesApplied { key, .. }
            | TxEvent::WriteBackDone { key, .. } => key,
        }
    }
}

/// Per-key transaction state machines plus the write-back lock set
#[derive(Debug)]
pub struct TransactionManager {
    states: HashMap<TxKey, TxState>,
    locks: HashSet<TxKey>,
    next_generation: u64,
    debounce: Duration,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(DEFAULT_PATCH_DEBOUNCE)
    }
}

impl TransactionManager {
    pub fn new(debounce: Duration) -> Self {
        Self {
            states: HashMap::new(),
            locks: HashSet::new(),
            next_generation: 0,
            debounce,
        }
    }

    pub fn phase(&self, key: &TxKey) -> TxPhase {
        self.states.get(key).map_or(TxPhase::Idle, TxState::phase)
    }

    /// Whether a write-back for `key` is in flight.
    ///
    /// Resource-change notifications for a locked key echo our own write and
    /// must not be treated as user edits.
    pub fn is_locked(&self, key: &TxKey) -> bool {
        self.locks.contains(key)
    }

    /// Patches were queued for `key`.
    ///
    /// Starts or restarts the debounce window. A request while a transaction
    /// is in flight is left to that transaction's draining step.
    pub fn request(&mut self, key: TxKey) -> Vec<TxEffect> {
        match self.states.get(&key) {
            None | Some(TxState::DebouncePending { .. }) => {
                let generation = self.bump_generation();
                trace!("Debouncing transaction for {} (generation {})", key, generation);
                self.states
                    .insert(key.clone(), TxState::DebouncePending { generation });
                vec![TxEffect::StartDebounce {
                    key,
                    generation,
                    delay: self.debounce,
                }]
            }
            Some(state) => {
                trace!(
                    "Transaction for {} in flight ({:?}); draining will pick up new patches",
                    key,
                    state.phase()
                );
                Vec::new()
            }
        }
    }

    /// Advance `event.key()`'s state machine against the current store state
    pub fn handle(&mut self, event: TxEvent, state: &AppState) -> Vec<TxEffect> {
        match event {
            TxEvent::DebounceElapsed { key, generation } => self.on_debounce_elapsed(key, generation, state),
            TxEvent::ContentFetched { key, result } => self.on_content_fetched(key, result, state),
            TxEvent::PatchesApplied { key, result } => self.on_patches_applied(key, result, state),
            TxEvent::WriteBackDone { key, result } => self.on_write_back_done(key, result, state),
        }
    }

    /// Drop every transaction and lock of a destroyed session.
    ///
    /// Results still in flight for these keys are ignored when they arrive.
    pub fn forget_tab(&mut self, tab: TabId) {
        self.states.retain(|key, _| key.tab != tab);
        self.locks.retain(|key| key.tab != tab);
    }

    /// Keys with a transaction in any non-idle phase
    pub fn active_count(&self) -> usize {
        self.states.len()
    }

    fn on_debounce_elapsed(&mut self, key: TxKey, generation: u64, state: &AppState) -> Vec<TxEffect> {
        match self.states.get(&key) {
            Some(TxState::DebouncePending { generation: current }) if *current == generation => {}
            _ => {
                trace!("Stale debounce timer for {} (generation {})", key, generation);
                return Vec::new();
            }
        }

        let Some(snapshot) = state.queued_patches(key.tab, &key.url) else {
            let reason = if state.session(key.tab).is_none() {
                "session destroyed"
            } else {
                "no queued patches"
            };
            debug!("{} for {}", Error::cancelled(reason), key);
            self.states.remove(&key);
            return Vec::new();
        };

        debug!("Fetching {} to apply {} patch(es)", key, snapshot.len());
        self.states.insert(
            key.clone(),
            TxState::Fetching {
                snapshot: snapshot.clone(),
            },
        );
        vec![TxEffect::FetchContent { key }]
    }

    fn on_content_fetched(&mut self, key: TxKey, result: Result<String>, state: &AppState) -> Vec<TxEffect> {
        let Some(TxState::Fetching { snapshot }) = self.states.get(&key) else {
            trace!("Ignoring content for {} outside Fetching", key);
            return Vec::new();
        };
        let snapshot = snapshot.clone();

        match result {
            Ok(content) => {
                self.states.insert(
                    key.clone(),
                    TxState::Applying {
                        snapshot: snapshot.clone(),
                    },
                );
                vec![TxEffect::ApplyPatches {
                    key,
                    content,
                    patches: snapshot,
                }]
            }
            Err(e) => self.fail(key, e, state),
        }
    }

    fn on_patches_applied(&mut self, key: TxKey, result: Result<String>, state: &AppState) -> Vec<TxEffect> {
        let Some(TxState::Applying { snapshot }) = self.states.get(&key) else {
            trace!("Ignoring patch result for {} outside Applying", key);
            return Vec::new();
        };
        let snapshot = snapshot.clone();

        let content = match result {
            Ok(content) => content,
            Err(e) => return self.fail(key, e, state),
        };

        // Verify: commit only if nothing was queued while we were applying
        let current = state.queued_patches(key.tab, &key.url);
        if !current.is_some_and(|current| Arc::ptr_eq(current, &snapshot)) {
            let reason = match current {
                Some(_) => "patches queued during apply",
                None => "patch queue changed during apply",
            };
            debug!("{} for {}", Error::cancelled(reason), key);
            return self.drain(key, state);
        }

        debug!(
            "Committing {} patch(es) to {}:\n{}",
            snapshot.len(),
            key,
            render_patches(&snapshot)
        );
        self.states.insert(
            key.clone(),
            TxState::Committing {
                snapshot,
                content: content.clone(),
            },
        );
        self.locks.insert(key.clone());
        vec![
            TxEffect::Dispatch(Action::ClearPatches {
                tab: key.tab,
                uri: key.url.clone(),
            }),
            TxEffect::WriteBack { key, content },
        ]
    }

    fn on_write_back_done(&mut self, key: TxKey, result: Result<()>, state: &AppState) -> Vec<TxEffect> {
        if !matches!(self.states.get(&key), Some(TxState::Committing { .. })) {
            trace!("Ignoring write-back result for {} outside Committing", key);
            return Vec::new();
        }
        let Some(TxState::Committing { snapshot, content }) = self.states.remove(&key) else {
            return Vec::new();
        };
        self.locks.remove(&key);

        match result {
            Ok(()) => {
                info!("Applied {} patch(es) to {}", snapshot.len(), key);
                let mut effects = vec![TxEffect::Committed {
                    key: key.clone(),
                    content,
                }];
                effects.extend(self.drain(key, state));
                effects
            }
            Err(e) => {
                warn!("Write-back to {} failed: {}; re-queuing patches", key, e);
                // Patches are re-applied ahead of anything queued since
                let mut effects = vec![
                    TxEffect::Dispatch(Action::RequeuePatches {
                        tab: key.tab,
                        uri: key.url.clone(),
                        patches: snapshot.to_vec(),
                    }),
                    TxEffect::ContentUnknown { key: key.clone() },
                ];
                if !e.is_disconnect() && !matches!(e, Error::NoHostChannel { .. }) {
                    effects.extend(self.request(key));
                }
                effects
            }
        }
    }

    /// Recover from a failed step.
    ///
    /// Without a host channel the key goes idle with its patches still
    /// queued; connecting a channel requests it again.
    fn fail(&mut self, key: TxKey, error: Error, state: &AppState) -> Vec<TxEffect> {
        if let Error::NoHostChannel { .. } = error {
            debug!("Transaction for {} deferred: {}", key, error);
            self.states.remove(&key);
            return Vec::new();
        }
        if error.is_disconnect() {
            warn!("Transaction for {} abandoned: {}", key, error);
            self.states.remove(&key);
            return Vec::new();
        }
        warn!("Transaction for {} failed: {}", key, error);
        self.drain(key, state)
    }

    /// Restart if patches are still queued, else go idle
    fn drain(&mut self, key: TxKey, state: &AppState) -> Vec<TxEffect> {
        self.states.remove(&key);
        let pending = state
            .queued_patches(key.tab, &key.url)
            .is_some_and(|patches| !patches.is_empty());
        if pending {
            self.request(key)
        } else {
            trace!("Transaction for {} idle", key);
            Vec::new()
        }
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}
