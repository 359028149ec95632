//! Application state owned by the [`Store`](crate::store::Store)
//!
//! Every field is an `Arc` so subscribers can detect change by reference.
//! Sessions refer to their page by key only; page data is resolved through
//! [`AppState::page_of`] at read time.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use livestyle_core::{Mapping, Page, Patch, Tab, TabId};

/// Normalized page URL → page configuration
pub type PageMap = BTreeMap<String, Arc<Page>>;

/// Tab → live session
pub type SessionMap = BTreeMap<TabId, Arc<Session>>;

/// Resource URL → patches not yet committed to that resource
pub type PatchQueue = BTreeMap<String, Arc<Vec<Patch>>>;

/// Root state
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub pages: Arc<PageMap>,
    pub sessions: Arc<SessionMap>,
    /// Files currently open in any connected editor
    pub editor_files: Arc<Vec<String>>,
    /// Open tabs as last reported by the host
    pub tabs: Arc<Vec<Tab>>,
}

impl AppState {
    pub fn session(&self, tab: TabId) -> Option<&Arc<Session>> {
        self.sessions.get(&tab)
    }

    /// The page a session belongs to
    pub fn page_of(&self, session: &Session) -> Option<&Arc<Page>> {
        self.pages.get(&session.page)
    }

    /// Queued patches for one resource of one tab
    pub fn queued_patches(&self, tab: TabId, url: &str) -> Option<&Arc<Vec<Patch>>> {
        self.sessions.get(&tab)?.patches.get(url)
    }
}

/// Live, per-tab instance of an enabled page
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Key into [`AppState::pages`]
    pub page: String,

    /// Union of the CSSOM, devtools and user stylesheet lists
    pub stylesheets: Arc<Vec<String>>,

    /// Stylesheets reported by the page's content script; `None` until fetched
    pub cssom_stylesheets: Option<Arc<Vec<String>>>,

    /// Stylesheets known to the developer-tools resource model; `None` until fetched
    pub devtools_stylesheets: Option<Arc<Vec<String>>>,

    /// Synthetic stylesheet id → resolved resource URL
    pub user_stylesheets: Arc<BTreeMap<String, String>>,

    pub auto_mapping: Arc<Mapping>,

    /// Effective browser → editor mapping (auto + valid user overrides)
    pub mapping: Arc<Mapping>,

    pub patches: Arc<PatchQueue>,

    /// Editor files whose unsaved content was already asked for
    pub requested_unsaved_files: Arc<BTreeSet<String>>,
}

impl Session {
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            stylesheets: Arc::default(),
            cssom_stylesheets: None,
            devtools_stylesheets: None,
            user_stylesheets: Arc::default(),
            auto_mapping: Arc::default(),
            mapping: Arc::default(),
            patches: Arc::default(),
            requested_unsaved_files: Arc::default(),
        }
    }

    /// Browser URLs mapped to `editor_file`
    pub fn browser_files_for<'a>(&'a self, editor_file: &'a str) -> impl Iterator<Item = &'a String> {
        self.mapping
            .iter()
            .filter(move |(_, editor)| editor.as_str() == editor_file)
            .map(|(browser, _)| browser)
    }
}
