//! Core domain types for LiveStyle
//!
//! Defines:
//! - `TabId` / `Tab` - Browser tab identity as reported by the host
//! - `Direction` - Which way changes are allowed to flow for a page
//! - `Page` - Persisted per-URL sync configuration
//! - `normalize_url()` - Page key normalization

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Browser-file path → editor-file path
pub type Mapping = BTreeMap<String, String>;

/// Browser tab identifier assigned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TabId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// An open browser tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub url: String,
}

impl Tab {
    pub fn new(id: impl Into<TabId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Page key this tab would be matched against
    pub fn page_key(&self) -> String {
        normalize_url(&self.url)
    }
}

/// Sync direction for a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Both,
    ToBrowser,
    ToEditor,
}

impl Direction {
    /// Editor edits may be applied to the browser
    pub fn allows_to_browser(self) -> bool {
        matches!(self, Direction::Both | Direction::ToBrowser)
    }

    /// Browser edits may be sent to the editor
    pub fn allows_to_editor(self) -> bool {
        matches!(self, Direction::Both | Direction::ToEditor)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Both => write!(f, "both"),
            Direction::ToBrowser => write!(f, "to-browser"),
            Direction::ToEditor => write!(f, "to-editor"),
        }
    }
}

/// Persisted configuration for a logical web page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub direction: Direction,

    /// User-picked overrides, browser path → editor path
    #[serde(default)]
    pub user_mapping: Arc<Mapping>,

    #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
    pub last_used: DateTime<Utc>,

    /// Synthetic stylesheet ids, in creation order
    #[serde(default)]
    pub user_stylesheets: Arc<Vec<String>>,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            enabled: false,
            direction: Direction::default(),
            user_mapping: Arc::default(),
            last_used: Utc::now(),
            user_stylesheets: Arc::default(),
        }
    }
}

impl Page {
    /// A freshly enabled page
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

/// Normalize a page URL into its page key.
///
/// The fragment never distinguishes pages. URLs the `url` crate cannot parse
/// (e.g. extension-internal pseudo URLs) are cut at `#` lexically.
pub fn normalize_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw.split('#').next().unwrap_or(raw).to_string(),
    }
}
