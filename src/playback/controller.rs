//! The playback state machine.
//!
//! The controller is only ever touched from the engine thread. User
//! commands, resource events and scan results all arrive through
//! [`Controller::handle`], so session and history mutations are serialized.
//!
//! Two counters keep asynchronous results honest:
//! - the resource generation, bumped on every acquire and release; a
//!   resource event carrying any other generation is dropped;
//! - the scan epoch, bumped on every folder change; a scan result from an
//!   older epoch is dropped.

use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::error::ResourceError;
use crate::history::HistoryStore;
use crate::library::{FolderSet, LibraryCache, Scanner, Track};

use super::resource::{MediaBackend, MediaResource, ResourceEvents};
use super::selector::pick_next;
use super::types::{
    Command, Counts, Msg, NowPlaying, PlaybackSession, PlaybackState, ResourceEvent,
    SessionStatus, StatusHandle,
};

/// Everything the engine needs besides the media backend.
pub struct EngineParts {
    pub history: HistoryStore,
    pub scanner: Arc<dyn Scanner>,
    pub folders: Vec<std::path::PathBuf>,
    pub cache_ttl: Duration,
    /// `None` waits for a prepare forever.
    pub prepare_timeout: Option<Duration>,
    pub tick: Duration,
    /// Fixed seed for reproducible picks; entropy when `None`.
    pub rng_seed: Option<u64>,
}

pub struct Controller<B: MediaBackend> {
    backend: B,
    resource: Option<B::Resource>,
    session: PlaybackSession,
    history: HistoryStore,
    cache: LibraryCache,
    scanner: Arc<dyn Scanner>,
    folders: FolderSet,
    scan_epoch: u64,
    scan_in_flight: bool,
    /// A play is waiting for the library to be scanned.
    pending_play: bool,
    counts: Counts,
    last_error: Option<String>,
    prepare_timeout: Option<Duration>,
    preparing_since: Option<Instant>,
    rng: StdRng,
    tx: Sender<Msg>,
    status: StatusHandle,
    observers: Vec<Sender<SessionStatus>>,
    published: SessionStatus,
}

impl<B: MediaBackend> Controller<B> {
    /// `tx` must feed the queue this controller is drained from.
    pub fn new(backend: B, parts: EngineParts, tx: Sender<Msg>, status: StatusHandle) -> Self {
        let rng = match parts.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            backend,
            resource: None,
            session: PlaybackSession::default(),
            history: parts.history,
            cache: LibraryCache::new(parts.cache_ttl),
            scanner: parts.scanner,
            folders: parts.folders.into_iter().collect(),
            scan_epoch: 0,
            scan_in_flight: false,
            pending_play: false,
            counts: Counts::Loading,
            last_error: None,
            prepare_timeout: parts.prepare_timeout,
            preparing_since: None,
            rng,
            tx,
            status,
            observers: Vec::new(),
            published: SessionStatus::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    pub fn current(&self) -> Option<&Track> {
        self.session.current.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.session.generation
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Apply one message. Returns `false` once the engine should exit.
    pub fn handle(&mut self, msg: Msg) -> bool {
        match msg {
            Msg::Command(cmd) => self.command(cmd),
            Msg::Resource { generation, event } => self.resource_event(generation, event),
            Msg::ScanFinished { epoch, tracks } => self.scan_finished(epoch, tracks),
            Msg::Subscribe(observer) => {
                if observer.send(self.snapshot()).is_ok() {
                    self.observers.push(observer);
                }
            }
            Msg::Shutdown => {
                self.stop();
                self.publish();
                return false;
            }
        }
        self.publish();
        true
    }

    /// Periodic housekeeping while the queue is quiet.
    pub fn tick(&mut self, now: Instant) {
        if let (Some(limit), Some(since)) = (self.prepare_timeout, self.preparing_since) {
            if self.session.state == PlaybackState::Preparing
                && now.saturating_duration_since(since) >= limit
            {
                self.fail(ResourceError::PrepareTimeout(limit.as_millis() as u64));
            }
        }
        self.publish();
    }

    fn command(&mut self, cmd: Command) {
        debug!(?cmd, state = ?self.session.state, "command");
        match cmd {
            Command::SetFolders(folders) => self.set_folders(folders),
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => match self.session.state {
                PlaybackState::Playing => self.pause(),
                PlaybackState::Paused => self.resume(),
                _ => {}
            },
            Command::Next {
                expected_generation,
            } => self.next(expected_generation),
            Command::Stop => self.stop(),
            Command::ClearHistory => {
                info!("play history cleared");
                self.history.clear();
                self.refresh_counts();
            }
            Command::RefreshCounts => self.refresh_counts(),
        }
    }

    fn set_folders(&mut self, folders: Vec<std::path::PathBuf>) {
        self.folders = folders.into_iter().collect();
        info!(folders = self.folders.len(), "folder selection changed");

        self.cache.invalidate();
        self.scan_epoch += 1;
        // Whatever is still scanning belongs to the old selection.
        self.scan_in_flight = false;
        self.counts = Counts::Loading;
        self.request_scan();
    }

    fn play(&mut self) {
        match self.session.state {
            PlaybackState::Idle => {
                self.last_error = None;
                self.advance();
            }
            PlaybackState::Paused => self.resume(),
            PlaybackState::Preparing | PlaybackState::Playing => {
                debug!("play ignored, already active");
            }
        }
    }

    fn pause(&mut self) {
        if self.session.state != PlaybackState::Playing {
            return;
        }
        if let Some(res) = self.resource.as_mut() {
            res.pause();
            self.session.state = PlaybackState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.session.state != PlaybackState::Paused {
            return;
        }
        if let Some(res) = self.resource.as_mut() {
            res.resume();
            self.session.state = PlaybackState::Playing;
        }
    }

    fn next(&mut self, expected_generation: Option<u64>) {
        if let Some(expected) = expected_generation {
            if expected != self.session.generation {
                debug!(
                    expected,
                    current = self.session.generation,
                    "skip already superseded"
                );
                return;
            }
        }

        if let Some(track) = self.session.current.take() {
            self.history.mark_played(&track.id);
        }
        self.release();
        self.session.state = PlaybackState::Idle;
        self.last_error = None;
        self.advance();
    }

    fn stop(&mut self) {
        self.release();
        self.session.current = None;
        self.session.state = PlaybackState::Idle;
        self.pending_play = false;
    }

    fn refresh_counts(&mut self) {
        match self.cache.get(&self.folders) {
            Some(library) => self.update_counts(&library),
            None => self.request_scan(),
        }
    }

    fn resource_event(&mut self, generation: u64, event: ResourceEvent) {
        if generation != self.session.generation || self.resource.is_none() {
            debug!(
                generation,
                current = self.session.generation,
                ?event,
                "stale resource event dropped"
            );
            return;
        }

        match event {
            ResourceEvent::Prepared => {
                if self.session.state != PlaybackState::Preparing {
                    return;
                }
                if let Some(res) = self.resource.as_mut() {
                    res.start();
                }
                self.preparing_since = None;
                self.session.state = PlaybackState::Playing;
                if let Some(track) = &self.session.current {
                    info!(title = %track.title, "playing");
                }
            }
            ResourceEvent::Completed => {
                if let Some(track) = self.session.current.take() {
                    debug!(title = %track.title, "track finished");
                    self.history.mark_played(&track.id);
                }
                self.release();
                self.session.state = PlaybackState::Idle;
                self.advance();
            }
            ResourceEvent::Failed(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: ResourceError) {
        warn!(error = %err, "playback failed");
        self.release();
        self.session.current = None;
        self.session.state = PlaybackState::Idle;
        self.last_error = Some(err.to_string());
    }

    /// Move from Idle to Preparing on a fresh pick, scanning first if needed.
    fn advance(&mut self) {
        match self.cache.get(&self.folders) {
            Some(library) => self.start_from(&library),
            None => {
                self.pending_play = true;
                self.request_scan();
            }
        }
    }

    fn start_from(&mut self, library: &[Track]) {
        let track = match pick_next(library, &mut self.history, &mut self.rng) {
            Ok(track) => track.clone(),
            Err(e) => {
                warn!(error = %e, "nothing to play");
                self.last_error = Some(format!("cannot play: {e}"));
                self.update_counts(library);
                return;
            }
        };
        self.acquire(track);
        self.update_counts(library);
    }

    fn acquire(&mut self, track: Track) {
        debug_assert!(
            self.resource.is_none(),
            "acquiring a media resource while one is live"
        );
        self.release();

        self.session.generation += 1;
        let events = ResourceEvents::new(self.session.generation, self.tx.clone());
        match self.backend.acquire(&track, events) {
            Ok(res) => {
                debug!(title = %track.title, generation = self.session.generation, "preparing");
                self.resource = Some(res);
                self.session.current = Some(track);
                self.session.state = PlaybackState::Preparing;
                self.preparing_since = Some(Instant::now());
            }
            Err(err) => {
                error!(error = %err, path = %track.path.display(), "could not acquire media resource");
                self.session.current = None;
                self.session.state = PlaybackState::Idle;
                self.last_error = Some(err.to_string());
            }
        }
    }

    fn release(&mut self) {
        if let Some(res) = self.resource.take() {
            res.release();
            self.session.generation += 1;
        }
        self.preparing_since = None;
    }

    fn request_scan(&mut self) {
        if self.scan_in_flight {
            return;
        }

        let epoch = self.scan_epoch;
        let folders = self.folders.clone();
        let scanner = Arc::clone(&self.scanner);
        let tx = self.tx.clone();

        let spawned = thread::Builder::new()
            .name("loopmuse-scan".to_string())
            .spawn(move || {
                let tracks = scanner.scan(&folders);
                let _ = tx.send(Msg::ScanFinished { epoch, tracks });
            });

        match spawned {
            Ok(_) => self.scan_in_flight = true,
            Err(e) => {
                error!(error = %e, "could not start library scan");
                self.counts = Counts::Failed;
                self.pending_play = false;
                self.last_error = Some("cannot play: library scan failed".to_string());
            }
        }
    }

    fn scan_finished(&mut self, epoch: u64, tracks: Vec<Track>) {
        if epoch != self.scan_epoch {
            debug!(epoch, current = self.scan_epoch, "scan for old folder selection dropped");
            return;
        }
        self.scan_in_flight = false;
        info!(tracks = tracks.len(), "library scanned");

        let library = self.cache.store(self.folders.clone(), tracks);
        self.update_counts(&library);

        if std::mem::take(&mut self.pending_play) && self.session.state == PlaybackState::Idle {
            self.start_from(&library);
        }
    }

    fn update_counts(&mut self, library: &[Track]) {
        self.counts = Counts::Ready {
            unplayed: self.history.unplayed(library).len(),
            total: library.len(),
        };
    }

    fn snapshot(&self) -> SessionStatus {
        SessionStatus {
            state: self.session.state,
            playing: self.session.state == PlaybackState::Playing,
            current: self.session.current.as_ref().map(NowPlaying::from),
            counts: self.counts,
            generation: self.session.generation,
            last_error: self.last_error.clone(),
        }
    }

    /// Push the snapshot to the shared handle and observers if it changed.
    fn publish(&mut self) {
        let snapshot = self.snapshot();
        if snapshot == self.published {
            return;
        }

        if let Ok(mut status) = self.status.lock() {
            *status = snapshot.clone();
        }
        self.observers.retain(|o| o.send(snapshot.clone()).is_ok());
        self.published = snapshot;
    }
}
