//! Error types shared across the engine.
//!
//! Everything here is recovered inside the engine; only `EngineError`
//! reaches callers of the session facade.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A directory (or entry) the scanner could not read. Logged and skipped.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("folder {0} does not exist")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Selection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("library is empty")]
    Empty,
}

/// Failure of the media resource (prepare, decode or output).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("prepare timed out after {0} ms")]
    PrepareTimeout(u64),
}

/// The history file could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("history file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("history file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode history: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Errors surfaced by the session facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("playback engine is not running")]
    Disconnected,
    #[error("media backend failed to start: {0}")]
    Backend(#[from] ResourceError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] io::Error),
}
