//! Best-effort process configuration (SPEC_FULL.md §2 item 7).
//!
//! This is strictly ambient: log verbosity and where the command log lives
//! on disk. It never touches command parsing or response formatting — the
//! wire protocol in spec.md §6.1 has no flags of its own.

use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};

/// The file name `Engine::open` defaults to when no config overrides it
/// (spec.md §6.2).
pub const DEFAULT_DB_FILE: &str = "data.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLoad {
    /// `log`/`fern` level filter: off|error|warn|info|debug|trace.
    pub log_level: String,

    /// Where the command log lives. `None` defaults to `data.db` in the
    /// working directory, per spec.md §6.2.
    pub db_path: Option<PathBuf>,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad { log_level: "info".to_string(), db_path: None }
    }
}

impl ConfigLoad {
    /// Loads the config file at `path` if present; a missing file is not an
    /// error and yields `ConfigLoad::default()` (SPEC_FULL.md §6.3).
    pub fn load(path: &std::path::Path) -> Self {
        if !path.exists() {
            return ConfigLoad::default();
        }
        match confy::load_path::<ConfigLoad>(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("failed to parse config file {}: {err}", path.display());
                ConfigLoad::default()
            }
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_is_not_an_error() {
        let cfg = ConfigLoad::load(std::path::Path::new("/nonexistent/ordkv.toml"));
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.db_path(), PathBuf::from(DEFAULT_DB_FILE));
    }

    #[test]
    fn db_path_override_is_respected() {
        let cfg = ConfigLoad { log_level: "debug".into(), db_path: Some("custom.db".into()) };
        assert_eq!(cfg.db_path(), PathBuf::from("custom.db"));
    }
}
