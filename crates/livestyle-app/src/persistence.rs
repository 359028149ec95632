//! Page configuration persistence
//!
//! Pages are stored as JSON. Two generations of the payload are accepted on
//! load:
//! - `{"pages": {url: Page}}` (current)
//! - `{"sessions": {url: {enabled, direction, mapping}}}` (legacy)
//!
//! Saving always writes the current generation. [`StateSaver`] throttles
//! writes so a burst of page changes produces one file write.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use livestyle_core::prelude::*;
use livestyle_core::{normalize_url, Direction, Mapping, Page};

use crate::state::PageMap;

/// Persisted snapshot, in either generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedState {
    Pages { pages: PageMap },
    Legacy { sessions: std::collections::BTreeMap<String, LegacyPage> },
}

/// Page entry of the legacy `{sessions}` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPage {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, alias = "userMapping")]
    pub mapping: Mapping,
}

impl PersistedState {
    pub fn from_pages(pages: &PageMap) -> Self {
        PersistedState::Pages {
            pages: pages.clone(),
        }
    }

    /// Pages keyed by normalized URL, whatever the generation
    pub fn into_pages(self) -> PageMap {
        match self {
            PersistedState::Pages { pages } => pages
                .into_iter()
                .map(|(url, page)| (normalize_url(&url), page))
                .collect(),
            PersistedState::Legacy { sessions } => sessions
                .into_iter()
                .map(|(url, legacy)| {
                    let page = Page {
                        enabled: legacy.enabled,
                        direction: legacy.direction,
                        user_mapping: Arc::new(legacy.mapping),
                        ..Page::default()
                    };
                    (normalize_url(&url), Arc::new(page))
                })
                .collect(),
        }
    }
}

/// JSON state file
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored state; `None` if nothing was saved yet
    pub fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            debug!("No state file at {:?}", self.path);
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", self.path))?;
        Ok(Some(state))
    }

    /// Replace the stored state (write to a sibling temp file, then rename)
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        debug!("Saved state to {:?}", self.path);
        Ok(())
    }
}

/// Trailing-edge throttled saver.
///
/// The first [`schedule_save`](Self::schedule_save) after a quiet period
/// starts a timer; calls during the wait only replace the pending snapshot.
/// When the timer fires the latest snapshot is written.
#[derive(Debug, Clone)]
pub struct StateSaver {
    file: StateFile,
    latest: Arc<Mutex<Option<PersistedState>>>,
    scheduled: Arc<AtomicBool>,
    throttle: Duration,
}

impl StateSaver {
    pub fn new(file: StateFile, throttle: Duration) -> Self {
        Self {
            file,
            latest: Arc::new(Mutex::new(None)),
            scheduled: Arc::new(AtomicBool::new(false)),
            throttle,
        }
    }

    pub fn file(&self) -> &StateFile {
        &self.file
    }

    /// Schedule a save of `state`
    pub fn schedule_save(&self, state: PersistedState) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(state);

        if self
            .scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            trace!("State save already scheduled");
            return;
        }

        let file = self.file.clone();
        let latest = self.latest.clone();
        let scheduled = self.scheduled.clone();
        let throttle = self.throttle;

        tokio::spawn(async move {
            tokio::time::sleep(throttle).await;

            // Re-arm before taking the snapshot so a concurrent schedule is
            // never lost
            scheduled.store(false, Ordering::SeqCst);
            let snapshot = latest.lock().unwrap_or_else(|e| e.into_inner()).take();

            if let Some(state) = snapshot {
                if let Err(e) = file.save(&state) {
                    error!("Failed to save state: {}", e);
                }
            }
        });
    }

    /// Write any pending snapshot immediately (shutdown)
    pub fn flush(&self) -> Result<()> {
        let snapshot = self
            .latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match snapshot {
            Some(state) => self.file.save(&state),
            None => Ok(()),
        }
    }
}
