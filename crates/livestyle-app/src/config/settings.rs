//! Settings loader for `config.toml`

use std::path::{Path, PathBuf};

use livestyle_core::prelude::*;

use super::types::Settings;

const CONFIG_FILENAME: &str = "config.toml";
const LIVESTYLE_DIR: &str = "livestyle";

/// `<config dir>/livestyle/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(LIVESTYLE_DIR).join(CONFIG_FILENAME))
}

/// Load settings from `path`, or from the default location.
///
/// A missing or unreadable file yields defaults; problems are logged.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let config_path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => {
            debug!("No config directory on this platform, using defaults");
            return Settings::default();
        }
    };

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Write a commented default `config.toml` unless one exists
pub fn init_config_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::config(format!("Failed to create {:?}: {}", parent, e)))?;
    }

    let default_content = r#"# LiveStyle Configuration

[timing]
# Quiet period after a browser edit before it is diffed
diff_debounce_ms = 150
# Quiet period after queued patches before they are applied
patch_debounce_ms = 1000
engine_timeout_ms = 10000
request_timeout_ms = 10000

[persistence]
enabled = true
throttle_ms = 3000
# path = "/path/to/state.json"
"#;
    std::fs::write(path, default_content)
        .map_err(|e| Error::config(format!("Failed to write {:?}: {}", path, e)))?;
    info!("Created default config at {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = load_settings(Some(&temp.path().join("missing.toml")));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_invalid_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[timing\nbroken").unwrap();

        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn test_init_then_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(CONFIG_FILENAME);

        init_config_file(&path).unwrap();
        assert!(path.exists());
        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[timing]\ndiff_debounce_ms = 5\n").unwrap();

        init_config_file(&path).unwrap();
        assert_eq!(load_settings(Some(&path)).timing.diff_debounce_ms, 5);
    }
}
