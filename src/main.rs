//! LiveStyle - keeps editor and browser stylesheets in sync
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use livestyle_app::config::{self, Settings};

/// LiveStyle - keeps editor and browser stylesheets in sync
#[derive(Parser, Debug)]
#[command(name = "livestyle")]
#[command(about = "Keeps editor and browser stylesheets in sync", long_about = None)]
struct Args {
    /// Path to config.toml (default: <config dir>/livestyle/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to the page state file (overrides the config file)
    #[arg(long, value_name = "PATH")]
    state: Option<PathBuf>,

    /// Do not load or save page state
    #[arg(long)]
    no_persist: bool,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,
}

impl Args {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(path) = &self.state {
            settings.persistence.path = Some(path.clone());
        }
        if self.no_persist {
            settings.persistence.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let config_path = args.config.clone().or_else(config::default_config_path);

    if args.init_config {
        let Some(path) = config_path else {
            eprintln!("No config directory on this platform; pass --config");
            std::process::exit(1);
        };
        config::init_config_file(&path)?;
        eprintln!("Config file: {}", path.display());
        return Ok(());
    }

    if let Some(path) = args.config.as_ref().filter(|path| !path.exists()) {
        return Err(livestyle_core::Error::ConfigNotFound { path: path.clone() }.into());
    }

    // Logs go to a file: stdout carries the bridge protocol
    livestyle_core::logging::init()?;

    let mut settings = config::load_settings(config_path.as_deref());
    args.apply_overrides(&mut settings);

    let result = livestyle::run_bridge(settings).await;
    if let Err(ref e) = result {
        tracing::error!("Bridge error: {:?}", e);
    }
    Ok(result?)
}
