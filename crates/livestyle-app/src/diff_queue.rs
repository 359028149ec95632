//! Browser-side change debouncing
//!
//! Every `resource-updated` notification for a resource restarts that
//! resource's diff window; only the latest content of a burst is diffed.
//! Also keeps the last known content of every resource, the baseline the
//! next diff is computed against.

use std::collections::HashMap;
use std::time::Duration;

use livestyle_core::TabId;

use crate::transaction::TxKey;

/// Default window between the last browser edit and the diff request
pub const DEFAULT_DIFF_DEBOUNCE: Duration = Duration::from_millis(150);

/// Timer the engine must start for a pushed update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffTimer {
    pub key: TxKey,
    pub generation: u64,
    pub delay: Duration,
}

#[derive(Debug)]
struct PendingUpdate {
    generation: u64,
    content: String,
}

/// Ready-to-diff pair of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffJob {
    pub key: TxKey,
    pub previous: String,
    pub content: String,
}

#[derive(Debug)]
pub struct DiffQueue {
    pending: HashMap<TxKey, PendingUpdate>,
    contents: HashMap<TxKey, String>,
    next_generation: u64,
    delay: Duration,
}

impl Default for DiffQueue {
    fn default() -> Self {
        Self::new(DEFAULT_DIFF_DEBOUNCE)
    }
}

impl DiffQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            contents: HashMap::new(),
            next_generation: 0,
            delay,
        }
    }

    /// Record a user edit and (re)start its window
    pub fn push(&mut self, key: TxKey, content: String) -> DiffTimer {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.pending.insert(
            key.clone(),
            PendingUpdate {
                generation,
                content,
            },
        );
        DiffTimer {
            key,
            generation,
            delay: self.delay,
        }
    }

    /// The window for `key` elapsed.
    ///
    /// Returns the job to run if `generation` is still current and there is a
    /// baseline differing from the new content. The new content becomes the
    /// baseline either way.
    pub fn elapsed(&mut self, key: &TxKey, generation: u64) -> Option<DiffJob> {
        match self.pending.get(key) {
            Some(pending) if pending.generation == generation => {}
            _ => return None,
        }
        let PendingUpdate { content, .. } = self.pending.remove(key)?;

        let previous = self.contents.insert(key.clone(), content.clone())?;
        (previous != content).then(|| DiffJob {
            key: key.clone(),
            previous,
            content,
        })
    }

    /// Record content known to be current without diffing it (fetches,
    /// write-backs, echoes of our own writes)
    pub fn set_content(&mut self, key: TxKey, content: String) {
        self.contents.insert(key, content);
    }

    /// Drop the baseline of a resource whose content can no longer be vouched for
    pub fn forget_content(&mut self, key: &TxKey) {
        self.contents.remove(key);
    }

    pub fn content(&self, key: &TxKey) -> Option<&str> {
        self.contents.get(key).map(String::as_str)
    }

    /// Drop pending edits and cached content of a destroyed session
    pub fn forget_tab(&mut self, tab: TabId) {
        self.pending.retain(|key, _| key.tab != tab);
        self.contents.retain(|key, _| key.tab != tab);
    }
}
