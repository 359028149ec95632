//! Bridge runner - main loop connecting stdio to the engine
//!
//! A blocking thread reads stdin lines; an async task parses them and feeds
//! the engine. Everything the engine, the resource channels and the diff
//! engine send out is funnelled into one writer task so stdout lines never
//! interleave.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use livestyle_app::config::{PersistenceSettings, Settings};
use livestyle_app::{Engine, Message, Outgoing, StateFile, StateSaver};
use livestyle_core::prelude::Result;
use livestyle_host::{BridgeDiffEngine, ChannelMessage, DiffEngine, ResourceChannel};

use super::{BridgeInput, BridgeOutput};

/// How long to wait for queued stdout lines after the engine stopped
const WRITER_DRAIN: Duration = Duration::from_millis(500);

/// Run the engine on stdin/stdout until stdin closes or a shutdown arrives
pub async fn run_bridge(settings: Settings) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("LiveStyle bridge starting");
    info!("═══════════════════════════════════════════════════════");

    let (out_tx, out_rx) = mpsc::unbounded_channel::<BridgeOutput>();
    let writer = tokio::spawn(write_outputs(out_rx));

    let (engine_tx, engine_rx) = mpsc::unbounded_channel::<ChannelMessage>();
    forward(engine_rx, out_tx.clone(), |message| BridgeOutput::Engine { message });
    let diff_engine = BridgeDiffEngine::new(engine_tx);

    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Outgoing>();
    forward(outgoing_rx, out_tx.clone(), BridgeOutput::from);

    let engine = Engine::new(settings.clone(), diff_engine.clone(), outgoing_tx);
    let mut engine = attach_persistence(engine, &settings.persistence);

    let bridge = Bridge::new(engine.msg_sender(), out_tx, diff_engine.clone());
    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || read_stdin_blocking(line_tx));
    let input = tokio::spawn(bridge.run(line_rx));

    engine.run().await;

    // Fail any diff computation still waiting on the other side
    diff_engine.disconnect();
    input.abort();
    drop(engine);
    drop(diff_engine);
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        debug!("Writer still busy at exit");
    }

    info!("LiveStyle bridge exiting");
    Ok(())
}

/// Restore persisted pages and install the saver, per settings
fn attach_persistence<D>(mut engine: Engine<D>, settings: &PersistenceSettings) -> Engine<D>
where
    D: DiffEngine + Sync + 'static,
{
    if !settings.enabled {
        info!("Persistence disabled");
        return engine;
    }
    let Some(path) = settings.state_path() else {
        warn!("No location for the state file; persistence disabled");
        return engine;
    };

    let file = StateFile::new(path);
    info!("State file: {}", file.path().display());
    match file.load() {
        Ok(Some(persisted)) => engine.restore(persisted),
        Ok(None) => {}
        Err(e) => warn!("Ignoring unreadable state file: {}", e),
    }
    engine.with_saver(StateSaver::new(file, settings.throttle()))
}

/// Routes parsed stdin lines
#[derive(Debug, Clone)]
pub struct Bridge {
    msg_tx: mpsc::UnboundedSender<Message>,
    out_tx: mpsc::UnboundedSender<BridgeOutput>,
    diff_engine: BridgeDiffEngine,
}

impl Bridge {
    pub fn new(
        msg_tx: mpsc::UnboundedSender<Message>,
        out_tx: mpsc::UnboundedSender<BridgeOutput>,
        diff_engine: BridgeDiffEngine,
    ) -> Self {
        Self {
            msg_tx,
            out_tx,
            diff_engine,
        }
    }

    /// Handle lines until the reader stops, then ask the engine to shut down
    pub async fn run(self, mut lines: mpsc::UnboundedReceiver<String>) {
        while let Some(line) = lines.recv().await {
            self.handle_line(&line);
        }
        info!("Stdin closed");
        self.send(Message::Shutdown);
    }

    /// Parse and route one NDJSON line; malformed lines are logged and skipped
    pub fn handle_line(&self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        match serde_json::from_str::<BridgeInput>(trimmed) {
            Ok(input) => self.handle_input(input),
            Err(e) => warn!("Ignoring malformed bridge line: {}", e),
        }
    }

    pub fn handle_input(&self, input: BridgeInput) {
        match input {
            BridgeInput::ChannelOpen { tab } => {
                let (channel_tx, channel_rx) = mpsc::unbounded_channel();
                forward(channel_rx, self.out_tx.clone(), move |message| {
                    BridgeOutput::Channel { tab, message }
                });
                self.send(Message::ChannelConnected(ResourceChannel::new(
                    tab, channel_tx,
                )));
            }
            BridgeInput::Engine { message } => {
                if !self.diff_engine.handle_reply(&message) {
                    debug!("Unmatched diff engine reply '{}'", message.action);
                }
            }
            other => {
                if let Some(msg) = other.into_message() {
                    self.send(msg);
                }
            }
        }
    }

    fn send(&self, msg: Message) {
        if self.msg_tx.send(msg).is_err() {
            debug!("Engine stopped, dropping bridge input");
        }
    }
}

/// Pipe `rx` into the writer, wrapping each item
fn forward<T, F>(
    mut rx: mpsc::UnboundedReceiver<T>,
    out_tx: mpsc::UnboundedSender<BridgeOutput>,
    wrap: F,
) where
    T: Send + 'static,
    F: Fn(T) -> BridgeOutput + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if out_tx.send(wrap(item)).is_err() {
                break;
            }
        }
    });
}

async fn write_outputs(mut out_rx: mpsc::UnboundedReceiver<BridgeOutput>) {
    while let Some(output) = out_rx.recv().await {
        output.emit();
    }
}

/// Read stdin lines on a dedicated thread
fn read_stdin_blocking(line_tx: mpsc::UnboundedSender<String>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
    debug!("Stdin reader exiting");
}
