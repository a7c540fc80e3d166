use std::{env, path::PathBuf};

use super::schema::Settings;

impl Settings {
    /// Read `config.toml` (if any), then let `LOOPMUSE__SECTION__KEY`
    /// variables override single keys. Anything unset keeps its default.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = resolve_config_path() {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        builder
            .add_source(
                ::config::Environment::with_prefix("LOOPMUSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.library.cache_ttl_secs == 0 {
            return Err("library.cache_ttl_secs must be >= 1".to_string());
        }
        if self.playback.tick_ms == 0 {
            return Err("playback.tick_ms must be >= 1".to_string());
        }
        Ok(())
    }

    /// The history file to use, honoring `history.path` when set.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history
            .path
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("loopmuse").join("history.toml")))
    }
}

/// `LOOPMUSE_CONFIG_PATH` when set, otherwise [`default_config_path`].
pub fn resolve_config_path() -> Option<PathBuf> {
    env::var_os("LOOPMUSE_CONFIG_PATH")
        .map(PathBuf::from)
        .or_else(default_config_path)
}

/// `loopmuse/config.toml` under the XDG config home (`~/.config` if unset).
pub fn default_config_path() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join("loopmuse").join("config.toml"))
}
