//! Playback-related small types and handles.
//!
//! This module defines the engine's state enum, the session object the
//! controller owns, the messages drained by the engine thread, and the
//! status snapshot shared with the facade.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use crate::error::ResourceError;
use crate::library::Track;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing loaded.
    #[default]
    Idle,
    /// A resource was acquired and is opening/decoding.
    Preparing,
    Playing,
    Paused,
}

/// The controller's single-writer session.
///
/// `current` is `Some` exactly when `state` is Preparing, Playing or Paused.
#[derive(Debug, Default)]
pub struct PlaybackSession {
    pub state: PlaybackState,
    pub current: Option<Track>,
    /// Bumped on every acquire and release of the media resource.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the folder selection; invalidates the library cache.
    SetFolders(Vec<PathBuf>),
    /// Start a random unplayed track (or resume when paused).
    Play,
    Pause,
    Resume,
    TogglePause,
    /// Mark the current track played and move on. With `Some(generation)`
    /// the skip is dropped when that resource has already been replaced.
    Next { expected_generation: Option<u64> },
    Stop,
    ClearHistory,
    RefreshCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    Prepared,
    Completed,
    Failed(ResourceError),
}

/// Everything the engine thread reacts to, in arrival order.
#[derive(Debug)]
pub enum Msg {
    Command(Command),
    Resource {
        generation: u64,
        event: ResourceEvent,
    },
    ScanFinished {
        epoch: u64,
        tracks: Vec<Track>,
    },
    Subscribe(Sender<SessionStatus>),
    Shutdown,
}

/// What the UI needs to show for the current track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub id: String,
    pub title: String,
    pub folder: PathBuf,
}

impl From<&Track> for NowPlaying {
    fn from(t: &Track) -> Self {
        Self {
            id: t.id.clone(),
            title: t.title.clone(),
            folder: t.folder.clone(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Counts {
    /// No scan has completed yet.
    #[default]
    Loading,
    Ready {
        unplayed: usize,
        total: usize,
    },
    Failed,
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counts::Loading => f.write_str("Loading..."),
            Counts::Ready { unplayed, total } => {
                write!(f, "{unplayed} unplayed / {total} total songs")
            }
            Counts::Failed => f.write_str("Error loading song counts"),
        }
    }
}

/// Observable engine state, published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub state: PlaybackState,
    pub playing: bool,
    pub current: Option<NowPlaying>,
    pub counts: Counts,
    pub generation: u64,
    /// Why the last play attempt failed, cleared by the next one.
    pub last_error: Option<String>,
}

pub type StatusHandle = Arc<Mutex<SessionStatus>>;
