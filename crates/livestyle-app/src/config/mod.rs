//! Configuration file parsing for LiveStyle
//!
//! Supports:
//! - `config.toml` - Timing and persistence settings

pub mod settings;
pub mod types;

pub use settings::{default_config_path, init_config_file, load_settings};
pub use types::*;
