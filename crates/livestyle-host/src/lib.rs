//! # livestyle-host - Collaborator Plumbing
//!
//! Connects the sync core to the processes it does not own: the per-tab
//! resource host (the browser's developer-tools resource model) and the
//! external diff/patch computation engine.
//!
//! Depends on [`livestyle_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Resource Host Channels
//! - [`ResourceChannel`] - Clonable per-tab handle with `request()` correlation
//! - [`ChannelRegistry`] - Tab → channel lookup (`NoHostChannel` when missing)
//! - [`ChannelMessage`], [`HostNotification`] - `{action, data}` wire shapes
//! - [`RequestTracker`] - Pending request/reply matching
//!
//! ### Diff Engine
//! - [`DiffEngine`] - Async `diff` / `patch` operations
//! - [`BridgeDiffEngine`] - Engine reached over the bridge transport

pub mod channel;
pub mod diff_engine;
pub mod protocol;
pub mod registry;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tracker;

// Public API re-exports
pub use channel::{ResourceChannel, DEFAULT_REQUEST_TIMEOUT};
pub use diff_engine::{
    BridgeDiffEngine, DiffEngine, DiffRequest, LocalDiffEngine, PatchRequest, APPLY_PATCH,
    CALCULATE_DIFF,
};
pub use protocol::{action, id_fields, ChannelMessage, HostNotification};
pub use registry::ChannelRegistry;
pub use tracker::RequestTracker;
