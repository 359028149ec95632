//! Stdio bridge - NDJSON transport between the engine and the host extension
//!
//! The process speaking to LiveStyle (the browser extension's native host, or
//! a test script) writes one JSON object per line on stdin and reads one per
//! line from stdout. Every line has a `"type"` field naming its kind.
//!
//! # Inbound
//!
//! ```json
//! {"type":"tabs","tabs":[{"id":1,"url":"http://localhost/"}]}
//! {"type":"channel-open","tab":1}
//! {"type":"channel","tab":1,"message":{"action":"resource-updated","data":{"url":"...","content":"..."}}}
//! {"type":"editor-files","files":["/src/style.css"]}
//! {"type":"editor-diff","uri":"/src/style.css","patches":[...]}
//! {"type":"enable-page","url":"http://localhost/"}
//! {"type":"engine","message":{"action":"apply-patch","data":{"token":7,"content":"..."}}}
//! ```
//!
//! # Outbound
//!
//! ```json
//! {"type":"channel","tab":1,"message":{"action":"get-resource-content","data":{"url":"..."}}}
//! {"type":"engine","message":{"action":"calculate-diff","data":{"token":8,...}}}
//! {"type":"editor-diff","uri":"/src/style.css","patches":[...]}
//! {"type":"cssom-patches","tab":1,"url":"...","patches":[...]}
//! ```

pub mod runner;

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use tracing::error;

use livestyle_app::{Action, Message, Outgoing};
use livestyle_core::{Diff, Direction, Patch, Tab, TabId};
use livestyle_host::ChannelMessage;

pub use runner::{run_bridge, Bridge};

/// A line read from stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BridgeInput {
    // ─────────────────────────────────────────────────────────
    // Host
    // ─────────────────────────────────────────────────────────
    Tabs { tabs: Vec<Tab> },
    TabUpdated { tab: Tab },
    TabClosed { tab: TabId },

    /// A tab's resource host became reachable
    ChannelOpen { tab: TabId },
    ChannelClosed { tab: TabId },
    /// Message from a tab's resource host
    Channel { tab: TabId, message: ChannelMessage },

    CssomStylesheets {
        tab: TabId,
        #[serde(default)]
        stylesheets: Option<Vec<String>>,
    },
    UserStylesheets {
        tab: TabId,
        #[serde(default)]
        stylesheets: BTreeMap<String, String>,
    },

    // ─────────────────────────────────────────────────────────
    // Editor
    // ─────────────────────────────────────────────────────────
    EditorDiff(Diff),
    EditorFiles { files: Vec<String> },

    /// Reply from the diff engine
    Engine { message: ChannelMessage },

    // ─────────────────────────────────────────────────────────
    // Page configuration
    // ─────────────────────────────────────────────────────────
    EnablePage { url: String },
    DisablePage { url: String },
    SetDirection { url: String, direction: Direction },
    SetUserMapping {
        url: String,
        browser: String,
        #[serde(default)]
        editor: Option<String>,
    },
    AddUserStylesheet { url: String },
    RemoveUserStylesheet { url: String, id: String },
    RemovePage { url: String },

    Shutdown,
}

impl BridgeInput {
    /// The engine message for inputs that map one-to-one.
    ///
    /// `None` for inputs the bridge handles itself (channel lifecycle and
    /// diff engine replies).
    pub fn into_message(self) -> Option<Message> {
        let msg = match self {
            BridgeInput::Tabs { tabs } => Message::TabsChanged(tabs),
            BridgeInput::TabUpdated { tab } => Message::TabUpdated(tab),
            BridgeInput::TabClosed { tab } => Message::TabClosed(tab),
            BridgeInput::ChannelClosed { tab } => Message::ChannelDisconnected(tab),
            BridgeInput::Channel { tab, message } => Message::ChannelInbound { tab, message },
            BridgeInput::CssomStylesheets { tab, stylesheets } => {
                Message::CssomStylesheets { tab, stylesheets }
            }
            BridgeInput::UserStylesheets { tab, stylesheets } => {
                Message::UserStylesheets { tab, stylesheets }
            }
            BridgeInput::EditorDiff(diff) => Message::EditorDiff(diff),
            BridgeInput::EditorFiles { files } => Message::EditorFiles(files),
            BridgeInput::EnablePage { url } => Message::Action(Action::EnablePage { url }),
            BridgeInput::DisablePage { url } => Message::Action(Action::DisablePage { url }),
            BridgeInput::SetDirection { url, direction } => {
                Message::Action(Action::SetDirection { url, direction })
            }
            BridgeInput::SetUserMapping {
                url,
                browser,
                editor,
            } => Message::Action(Action::SetUserMapping {
                url,
                browser,
                editor,
            }),
            BridgeInput::AddUserStylesheet { url } => {
                Message::Action(Action::AddUserStylesheet { url })
            }
            BridgeInput::RemoveUserStylesheet { url, id } => {
                Message::Action(Action::RemoveUserStylesheet { url, id })
            }
            BridgeInput::RemovePage { url } => Message::Action(Action::RemovePage { url }),
            BridgeInput::Shutdown => Message::Shutdown,
            BridgeInput::ChannelOpen { .. } | BridgeInput::Engine { .. } => return None,
        };
        Some(msg)
    }
}

/// A line written to stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BridgeOutput {
    /// Request to a tab's resource host
    Channel { tab: TabId, message: ChannelMessage },
    /// Request to the diff engine
    Engine { message: ChannelMessage },

    /// Browser-side change for the editor
    EditorDiff(Diff),
    /// Ask the editor for unsaved content
    RequestUnsavedFiles { files: Vec<String> },
    /// Live-apply patches to a tab's CSSOM
    CssomPatches {
        tab: TabId,
        url: String,
        patches: Vec<Patch>,
    },
}

impl From<Outgoing> for BridgeOutput {
    fn from(msg: Outgoing) -> Self {
        match msg {
            Outgoing::EditorDiff(diff) => BridgeOutput::EditorDiff(diff),
            Outgoing::RequestUnsavedFiles { files } => BridgeOutput::RequestUnsavedFiles { files },
            Outgoing::CssomPatches { tab, url, patches } => {
                BridgeOutput::CssomPatches { tab, url, patches }
            }
        }
    }
}

impl BridgeOutput {
    /// Write this message as one NDJSON line
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        let json = serde_json::to_string(self)?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }

    /// Emit this message to stdout
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write bridge message to stdout: {}", e);
        }
    }
}
