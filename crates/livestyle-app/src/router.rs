//! Diff routing
//!
//! Decides which sessions receive an incoming diff and in which direction.
//! Pure functions of the current state; the engine turns the result into
//! store actions and outgoing messages.

use livestyle_core::prelude::*;
use livestyle_core::{Diff, Patch, TabId};

use crate::action::Action;
use crate::state::AppState;

/// Patches destined for one browser resource of one tab
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRoute {
    pub tab: TabId,
    pub uri: String,
    pub patches: Vec<Patch>,
}

impl PatchRoute {
    /// The store action queueing these patches for the transaction manager
    pub fn queue_action(&self) -> Action {
        Action::QueuePatches {
            tab: self.tab,
            uri: self.uri.clone(),
            patches: self.patches.clone(),
        }
    }
}

/// Where a change made in the browser goes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowserRoute {
    /// Diff for the editor, keyed by editor file
    pub editor: Option<Diff>,
    /// Other tabs showing a resource mapped to the same editor file
    pub tabs: Vec<PatchRoute>,
}

impl BrowserRoute {
    pub fn is_empty(&self) -> bool {
        self.editor.is_none() && self.tabs.is_empty()
    }
}

/// Route an editor-side diff to every session mapping a resource to
/// `diff.uri`, provided its page accepts editor → browser changes.
pub fn route_editor_diff(state: &AppState, diff: &Diff) -> Vec<PatchRoute> {
    if diff.is_empty() {
        return Vec::new();
    }
    to_browser_routes(state, &diff.uri, &diff.patches, None)
}

/// Route a diff observed on `url` in `tab`.
///
/// # Errors
///
/// [`Error::NoSessionForTab`] if `tab` has no session.
pub fn route_browser_diff(
    state: &AppState,
    tab: TabId,
    url: &str,
    patches: &[Patch],
) -> Result<BrowserRoute> {
    let session = state.session(tab).ok_or(Error::NoSessionForTab { tab })?;

    let Some(editor_file) = session.mapping.get(url) else {
        trace!("{} is not mapped in tab {}", url, tab);
        return Ok(BrowserRoute::default());
    };
    if patches.is_empty() {
        return Ok(BrowserRoute::default());
    }

    let to_editor = state
        .page_of(session)
        .is_some_and(|page| page.direction.allows_to_editor());

    Ok(BrowserRoute {
        editor: to_editor.then(|| Diff::new(editor_file.clone(), patches.to_vec())),
        tabs: to_browser_routes(state, editor_file, patches, Some(tab)),
    })
}

fn to_browser_routes(
    state: &AppState,
    editor_file: &str,
    patches: &[Patch],
    origin: Option<TabId>,
) -> Vec<PatchRoute> {
    let mut routes = Vec::new();
    for (tab, session) in state.sessions.iter() {
        if Some(*tab) == origin {
            continue;
        }
        let accepts = state
            .page_of(session)
            .is_some_and(|page| page.enabled && page.direction.allows_to_browser());
        if !accepts {
            continue;
        }
        for uri in session.browser_files_for(editor_file) {
            routes.push(PatchRoute {
                tab: *tab,
                uri: uri.clone(),
                patches: patches.to_vec(),
            });
        }
    }
    routes
}
