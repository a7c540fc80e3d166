use std::path::PathBuf;

use serde::Deserialize;

/// Top-level engine settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/loopmuse/config.toml` or `~/.config/loopmuse/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `LOOPMUSE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub history: HistorySettings,
    pub playback: PlaybackSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Folders to scan. Empty means the platform music + downloads folders.
    pub folders: Vec<PathBuf>,
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning. Cyclic links are skipped.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
    /// How long a scan result is reused before rescanning (seconds).
    pub cache_ttl_secs: u64,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            extensions: vec![
                "mp3".into(),
                "m4a".into(),
                "wav".into(),
                "flac".into(),
                "ogg".into(),
            ],
            follow_links: true,
            include_hidden: true,
            max_depth: None,
            cache_ttl_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Where play history is persisted.
    /// Defaults to `<data dir>/loopmuse/history.toml`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Give up on a track whose prepare takes longer than this (milliseconds).
    /// 0 waits forever.
    pub prepare_timeout_ms: u64,
    /// How often the engine thread wakes up when idle (milliseconds).
    pub tick_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            prepare_timeout_ms: 0,
            tick_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter used when `RUST_LOG` is not set, e.g. "info" or "loopmuse=debug".
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
