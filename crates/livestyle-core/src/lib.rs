//! # livestyle-core - Core Domain Types
//!
//! Foundation crate for LiveStyle. Provides domain types, error handling and
//! the logging bootstrap.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing, url).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`TabId`], [`Tab`] - Browser tab identity
//! - [`Direction`] - Sync direction for a page (both, to-browser, to-editor)
//! - [`Page`] - Persisted per-URL sync configuration
//! - [`normalize_url()`] - Page key normalization
//!
//! ### Patches (`patch`)
//! - [`Patch`] - An atomic rule-level stylesheet change
//! - [`Diff`] - Ordered patches for one resource
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use livestyle_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod patch;
pub mod types;

/// Prelude for common imports used throughout all LiveStyle crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use patch::{render_patches, Diff, Patch, PatchAction, PatchHint, PathSegment, Property};
pub use types::{normalize_url, Direction, Mapping, Page, Tab, TabId};
