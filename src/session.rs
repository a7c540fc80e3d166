//! The public face of the engine.
//!
//! A `Session` owns the engine thread and forwards every call to it as a
//! command. Queries read the last published status, so they never block on
//! playback work.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::Settings;
use crate::error::{EngineError, ResourceError};
use crate::history::HistoryStore;
use crate::library::{FolderSet, FsScanner, Scanner};
use crate::playback::{
    Command, Engine, EngineParts, MediaBackend, NowPlaying, RodioBackend, SessionStatus,
    StatusHandle,
};

pub struct Session {
    engine: Engine,
    status: StatusHandle,
    scanner: Arc<FsScanner>,
    folders: Mutex<FolderSet>,
}

impl Session {
    /// Start an engine on the default audio device with history persisted
    /// where `settings` says.
    pub fn open(settings: &Settings, folders: Vec<PathBuf>) -> Result<Self, EngineError> {
        let history = match settings.history_path() {
            Some(path) => HistoryStore::open(path),
            None => HistoryStore::in_memory(),
        };
        Self::with_backend(
            RodioBackend::open_default,
            settings,
            history,
            folders,
            default_folders(),
        )
    }

    /// Start an engine on a custom media backend.
    ///
    /// `default_folders` are scanned whenever the selection is empty.
    pub fn with_backend<B, F>(
        make_backend: F,
        settings: &Settings,
        history: HistoryStore,
        folders: Vec<PathBuf>,
        default_folders: Vec<PathBuf>,
    ) -> Result<Self, EngineError>
    where
        B: MediaBackend,
        F: FnOnce() -> Result<B, ResourceError> + Send + 'static,
    {
        let scanner = Arc::new(FsScanner::new(settings.library.clone(), default_folders));
        let prepare_timeout = match settings.playback.prepare_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let parts = EngineParts {
            history,
            scanner: Arc::clone(&scanner) as Arc<dyn Scanner>,
            folders: folders.clone(),
            cache_ttl: Duration::from_secs(settings.library.cache_ttl_secs),
            prepare_timeout,
            tick: Duration::from_millis(settings.playback.tick_ms.max(1)),
            rng_seed: None,
        };

        let engine = Engine::spawn(make_backend, parts)?;
        Ok(Self {
            status: engine.status_handle(),
            engine,
            scanner,
            folders: Mutex::new(folders.into_iter().collect()),
        })
    }

    /// Replace the folder selection. Counts go back to loading until the
    /// new library is scanned.
    pub fn set_folders(&self, folders: Vec<PathBuf>) -> Result<(), EngineError> {
        *lock(&self.folders) = folders.iter().cloned().collect();
        self.engine.send(Command::SetFolders(folders))
    }

    pub fn play(&self) -> Result<(), EngineError> {
        self.engine.send(Command::Play)
    }

    pub fn pause(&self) -> Result<(), EngineError> {
        self.engine.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<(), EngineError> {
        self.engine.send(Command::Resume)
    }

    pub fn toggle_pause(&self) -> Result<(), EngineError> {
        self.engine.send(Command::TogglePause)
    }

    /// Skip the track this session last saw. If that track already ended on
    /// its own, the skip is dropped instead of skipping its successor.
    pub fn next(&self) -> Result<(), EngineError> {
        let observed = self.status().generation;
        self.engine.send(Command::Next {
            expected_generation: Some(observed),
        })
    }

    pub fn stop(&self) -> Result<(), EngineError> {
        self.engine.send(Command::Stop)
    }

    pub fn clear_history(&self) -> Result<(), EngineError> {
        self.engine.send(Command::ClearHistory)
    }

    pub fn refresh_counts(&self) -> Result<(), EngineError> {
        self.engine.send(Command::RefreshCounts)
    }

    pub fn status(&self) -> SessionStatus {
        lock(&*self.status).clone()
    }

    pub fn is_playing(&self) -> bool {
        lock(&*self.status).playing
    }

    pub fn current_track(&self) -> Option<NowPlaying> {
        lock(&*self.status).current.clone()
    }

    /// Display string: "Loading...", "<u> unplayed / <t> total songs" or
    /// "Error loading song counts".
    pub fn counts(&self) -> String {
        lock(&*self.status).counts.to_string()
    }

    pub fn subscribe(&self) -> Result<Receiver<SessionStatus>, EngineError> {
        self.engine.subscribe()
    }

    /// Directories under the current selection that hold audio files.
    /// Walks the filesystem on the calling thread.
    pub fn available_folders(&self) -> Vec<PathBuf> {
        let folders = lock(&self.folders).clone();
        self.scanner.available_folders(&folders)
    }

    /// Stop playback and join the engine. Later commands fail with
    /// [`EngineError::Disconnected`].
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

/// Platform music and downloads folders that exist on this machine.
pub fn default_folders() -> Vec<PathBuf> {
    [dirs::audio_dir(), dirs::download_dir()]
        .into_iter()
        .flatten()
        .filter(|p| p.is_dir())
        .collect()
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
