use super::*;
use crate::config::LibrarySettings;
use crate::error::ResourceError;
use crate::history::HistoryStore;
use crate::library::{FolderSet, FsScanner, Scanner, Track};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Log {
    acquired: Vec<String>,
    events: Vec<ResourceEvents>,
    live: usize,
    max_live: usize,
    started: usize,
    paused: usize,
    resumed: usize,
    released: usize,
}

type SharedLog = Arc<Mutex<Log>>;

struct FakeBackend {
    log: SharedLog,
    refuse: bool,
}

struct FakeResource {
    log: SharedLog,
}

impl MediaBackend for FakeBackend {
    type Resource = FakeResource;

    fn acquire(
        &mut self,
        track: &Track,
        events: ResourceEvents,
    ) -> Result<FakeResource, ResourceError> {
        if self.refuse {
            return Err(ResourceError::Output("no device".into()));
        }
        let mut log = self.log.lock().unwrap();
        log.acquired.push(track.id.clone());
        log.events.push(events);
        log.live += 1;
        log.max_live = log.max_live.max(log.live);
        Ok(FakeResource {
            log: self.log.clone(),
        })
    }
}

impl MediaResource for FakeResource {
    fn start(&mut self) {
        self.log.lock().unwrap().started += 1;
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().paused += 1;
    }

    fn resume(&mut self) {
        self.log.lock().unwrap().resumed += 1;
    }

    fn release(self) {
        let mut log = self.log.lock().unwrap();
        log.live -= 1;
        log.released += 1;
    }
}

struct FixedScanner {
    tracks: Vec<Track>,
    calls: AtomicUsize,
}

impl Scanner for FixedScanner {
    fn scan(&self, _folders: &FolderSet) -> Vec<Track> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tracks.clone()
    }
}

fn tracks(names: &[&str]) -> Vec<Track> {
    names
        .iter()
        .map(|n| Track::from_path(Path::new(&format!("/music/{n}.mp3"))))
        .collect()
}

struct Harness {
    ctl: Controller<FakeBackend>,
    rx: Receiver<Msg>,
    log: SharedLog,
    status: StatusHandle,
}

fn parts(scanner: Arc<dyn Scanner>) -> EngineParts {
    EngineParts {
        history: HistoryStore::in_memory(),
        scanner,
        folders: vec![PathBuf::from("/music")],
        cache_ttl: Duration::from_secs(30),
        prepare_timeout: None,
        tick: Duration::from_millis(10),
        rng_seed: Some(7),
    }
}

fn harness_with(parts: EngineParts, refuse: bool) -> Harness {
    let (tx, rx) = mpsc::channel();
    let log = SharedLog::default();
    let status = StatusHandle::default();
    let backend = FakeBackend {
        log: log.clone(),
        refuse,
    };
    Harness {
        ctl: Controller::new(backend, parts, tx, status.clone()),
        rx,
        log,
        status,
    }
}

fn harness(names: &[&str]) -> (Harness, Arc<FixedScanner>) {
    let scanner = Arc::new(FixedScanner {
        tracks: tracks(names),
        calls: AtomicUsize::new(0),
    });
    (harness_with(parts(scanner.clone()), false), scanner)
}

impl Harness {
    fn cmd(&mut self, cmd: Command) {
        self.ctl.handle(Msg::Command(cmd));
    }

    /// What the facade does: tag the skip with the generation it saw.
    fn next(&mut self) {
        let observed = self.ctl.generation();
        self.cmd(Command::Next {
            expected_generation: Some(observed),
        });
    }

    fn wait_for_scan(&mut self) {
        loop {
            let msg = self
                .rx
                .recv_timeout(Duration::from_secs(5))
                .expect("scan result");
            let done = matches!(msg, Msg::ScanFinished { .. });
            self.ctl.handle(msg);
            if done {
                break;
            }
        }
    }

    fn deliver(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.ctl.handle(msg);
        }
    }

    fn latest_events(&self) -> ResourceEvents {
        self.log.lock().unwrap().events.last().cloned().expect("a resource")
    }

    fn prepare_latest(&mut self) {
        self.latest_events().prepared();
        self.deliver();
    }

    fn complete_latest(&mut self) {
        self.latest_events().completed();
        self.deliver();
    }

    fn start_playing(&mut self) {
        self.cmd(Command::Play);
        self.wait_for_scan();
        self.prepare_latest();
    }

    fn current_id(&self) -> String {
        self.ctl.current().expect("a current track").id.clone()
    }

    fn status(&self) -> SessionStatus {
        self.status.lock().unwrap().clone()
    }
}

#[test]
fn play_prepares_then_starts() {
    let (mut h, _) = harness(&["a", "b", "c"]);

    h.cmd(Command::Play);
    assert_eq!(h.ctl.state(), PlaybackState::Idle);
    h.wait_for_scan();
    assert_eq!(h.ctl.state(), PlaybackState::Preparing);
    assert!(h.ctl.current().is_some());
    assert!(!h.status().playing);

    h.prepare_latest();
    assert_eq!(h.ctl.state(), PlaybackState::Playing);
    assert_eq!(h.log.lock().unwrap().started, 1);

    let status = h.status();
    assert!(status.playing);
    assert_eq!(status.current.unwrap().id, h.current_id());
    assert_eq!(status.counts.to_string(), "3 unplayed / 3 total songs");
}

#[test]
fn completion_marks_played_and_moves_to_an_unplayed_track() {
    let (mut h, _) = harness(&["a", "b", "c"]);
    h.start_playing();
    let first = h.current_id();

    h.complete_latest();
    assert!(h.ctl.history().is_played(&first));
    assert_eq!(h.ctl.state(), PlaybackState::Preparing);
    assert_ne!(h.current_id(), first);

    h.prepare_latest();
    assert_eq!(h.status().counts.to_string(), "2 unplayed / 3 total songs");
}

#[test]
fn three_file_scenario_rolls_over_after_the_third_completion() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.mp3", "b.mp3", "c.mp3"] {
        std::fs::write(dir.path().join(name), b"not real").unwrap();
    }
    let scanner = Arc::new(FsScanner::new(LibrarySettings::default(), Vec::new()));
    let mut p = parts(scanner);
    p.folders = vec![dir.path().to_path_buf()];
    let mut h = harness_with(p, false);

    h.start_playing();
    assert!(h.status().playing);

    let mut played = Vec::new();
    played.push(h.current_id());
    for _ in 0..2 {
        h.complete_latest();
        h.prepare_latest();
        let id = h.current_id();
        assert!(!played.contains(&id), "repeat inside a cycle");
        played.push(id);
    }
    assert_eq!(played.iter().collect::<HashSet<_>>().len(), 3);

    // Third completion exhausts the library; the fourth pick comes from a fresh cycle.
    h.complete_latest();
    h.prepare_latest();
    assert!(h.status().playing);
    assert!(played.contains(&h.current_id()));
    assert!(h.ctl.history().is_empty());
    assert_eq!(h.log.lock().unwrap().max_live, 1);
}

#[test]
fn n_skips_cover_the_library_once() {
    let names = ["a", "b", "c", "d", "e", "f"];
    let (mut h, _) = harness(&names);
    h.start_playing();

    let mut seen = HashSet::new();
    seen.insert(h.current_id());
    for _ in 1..names.len() {
        h.next();
        h.prepare_latest();
        assert!(seen.insert(h.current_id()), "repeat before the cycle ended");
    }
    assert_eq!(seen.len(), names.len());
    assert_eq!(h.ctl.history().len(), names.len() - 1);

    // The (n+1)-th advance resets the cycle.
    h.next();
    assert!(h.ctl.history().is_empty());
    assert!(h.ctl.current().is_some());
}

#[test]
fn completion_then_queued_user_skip_advances_once() {
    let (mut h, _) = harness(&["a", "b", "c"]);
    h.start_playing();
    let first = h.current_id();
    let observed = h.ctl.generation();

    // The track ends and is handled before the user's skip arrives.
    h.latest_events().completed();
    h.deliver();
    h.ctl.handle(Msg::Command(Command::Next {
        expected_generation: Some(observed),
    }));

    let log = h.log.lock().unwrap();
    assert_eq!(log.acquired.len(), 2);
    assert_eq!(log.max_live, 1);
    drop(log);
    assert_eq!(h.ctl.history().len(), 1);
    assert!(h.ctl.history().is_played(&first));
    assert_ne!(h.current_id(), first);
}

#[test]
fn user_skip_then_late_completion_advances_once() {
    let (mut h, _) = harness(&["a", "b", "c"]);
    h.start_playing();
    let first = h.current_id();
    let stale = h.latest_events();

    h.next();
    let second = h.current_id();
    stale.completed();
    h.deliver();

    assert_eq!(h.current_id(), second);
    assert_eq!(h.ctl.history().len(), 1);
    assert!(h.ctl.history().is_played(&first));
    let log = h.log.lock().unwrap();
    assert_eq!(log.acquired.len(), 2);
    assert_eq!(log.live, 1);
}

#[test]
fn stop_wins_over_an_in_flight_prepare() {
    let (mut h, _) = harness(&["a", "b"]);
    h.cmd(Command::Play);
    h.wait_for_scan();
    let stale = h.latest_events();

    h.cmd(Command::Stop);
    stale.prepared();
    h.deliver();

    assert_eq!(h.ctl.state(), PlaybackState::Idle);
    assert!(h.ctl.current().is_none());
    let log = h.log.lock().unwrap();
    assert_eq!(log.started, 0);
    assert_eq!(log.live, 0);
}

#[test]
fn stop_cancels_a_play_waiting_for_the_scan() {
    let (mut h, _) = harness(&["a"]);
    h.cmd(Command::Play);
    h.cmd(Command::Stop);
    h.wait_for_scan();

    assert_eq!(h.ctl.state(), PlaybackState::Idle);
    assert!(h.log.lock().unwrap().acquired.is_empty());
}

#[test]
fn resource_error_returns_to_idle_without_recording() {
    let (mut h, _) = harness(&["a", "b"]);
    h.cmd(Command::Play);
    h.wait_for_scan();
    let failed = h.current_id();

    h.latest_events().failed(ResourceError::Decode {
        path: PathBuf::from("/music/a.mp3"),
        reason: "garbage".into(),
    });
    h.deliver();

    assert_eq!(h.ctl.state(), PlaybackState::Idle);
    assert!(h.ctl.current().is_none());
    assert!(!h.ctl.history().is_played(&failed));
    assert!(h.status().last_error.unwrap().contains("garbage"));

    h.cmd(Command::Play);
    h.prepare_latest();
    assert_eq!(h.ctl.state(), PlaybackState::Playing);
    assert!(h.status().last_error.is_none());
}

#[test]
fn pause_and_resume_keep_track_and_generation() {
    let (mut h, _) = harness(&["a", "b"]);
    h.start_playing();
    let id = h.current_id();
    let generation = h.ctl.generation();

    h.cmd(Command::Pause);
    assert_eq!(h.ctl.state(), PlaybackState::Paused);
    assert!(!h.status().playing);

    h.cmd(Command::TogglePause);
    assert_eq!(h.ctl.state(), PlaybackState::Playing);

    h.cmd(Command::TogglePause);
    h.cmd(Command::Play);
    assert_eq!(h.ctl.state(), PlaybackState::Playing);

    assert_eq!(h.current_id(), id);
    assert_eq!(h.ctl.generation(), generation);
    let log = h.log.lock().unwrap();
    assert_eq!(log.paused, 2);
    assert_eq!(log.resumed, 2);
}

#[test]
fn pause_is_ignored_while_preparing() {
    let (mut h, _) = harness(&["a"]);
    h.cmd(Command::Play);
    h.wait_for_scan();
    h.cmd(Command::Pause);
    assert_eq!(h.ctl.state(), PlaybackState::Preparing);
}

#[test]
fn empty_library_reports_cannot_play() {
    let (mut h, _) = harness(&[]);
    h.cmd(Command::Play);
    h.wait_for_scan();

    assert_eq!(h.ctl.state(), PlaybackState::Idle);
    assert!(h.log.lock().unwrap().acquired.is_empty());
    let status = h.status();
    assert_eq!(status.last_error.as_deref(), Some("cannot play: library is empty"));
    assert_eq!(status.counts.to_string(), "0 unplayed / 0 total songs");
}

#[test]
fn library_is_reused_within_ttl_and_rescanned_on_folder_change() {
    let (mut h, scanner) = harness(&["a", "b"]);
    h.start_playing();
    h.cmd(Command::Stop);
    h.cmd(Command::Play);
    assert_eq!(h.ctl.state(), PlaybackState::Preparing);
    assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);

    h.cmd(Command::SetFolders(vec![PathBuf::from("/elsewhere")]));
    assert_eq!(h.status().counts, Counts::Loading);
    h.wait_for_scan();
    assert_eq!(scanner.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn scan_for_a_replaced_selection_is_dropped() {
    let (mut h, _) = harness(&["a", "b"]);
    h.cmd(Command::SetFolders(vec![PathBuf::from("/new")]));
    h.ctl.handle(Msg::ScanFinished {
        epoch: 0,
        tracks: tracks(&["stale"]),
    });
    assert_eq!(h.status().counts, Counts::Loading);

    h.wait_for_scan();
    assert_eq!(
        h.status().counts,
        Counts::Ready {
            unplayed: 2,
            total: 2
        }
    );
}

#[test]
fn clear_history_refreshes_counts() {
    let (mut h, _) = harness(&["a", "b", "c"]);
    h.start_playing();
    h.next();
    assert_eq!(h.status().counts.to_string(), "2 unplayed / 3 total songs");

    h.cmd(Command::ClearHistory);
    assert!(h.ctl.history().is_empty());
    assert_eq!(h.status().counts.to_string(), "3 unplayed / 3 total songs");
}

#[test]
fn refresh_counts_scans_when_nothing_is_cached() {
    let (mut h, scanner) = harness(&["a", "b"]);
    assert_eq!(h.status().counts.to_string(), "Loading...");
    h.cmd(Command::RefreshCounts);
    h.wait_for_scan();
    assert_eq!(h.status().counts.to_string(), "2 unplayed / 2 total songs");

    h.cmd(Command::RefreshCounts);
    assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stuck_prepare_times_out_when_watchdog_is_enabled() {
    let scanner = Arc::new(FixedScanner {
        tracks: tracks(&["a"]),
        calls: AtomicUsize::new(0),
    });
    let mut p = parts(scanner);
    p.prepare_timeout = Some(Duration::from_millis(50));
    let mut h = harness_with(p, false);

    h.cmd(Command::Play);
    h.wait_for_scan();
    h.ctl.tick(Instant::now());
    assert_eq!(h.ctl.state(), PlaybackState::Preparing);

    h.ctl.tick(Instant::now() + Duration::from_secs(1));
    assert_eq!(h.ctl.state(), PlaybackState::Idle);
    assert!(h.status().last_error.unwrap().contains("timed out"));
    assert_eq!(h.log.lock().unwrap().live, 0);
}

#[test]
fn backend_refusal_leaves_engine_idle() {
    let scanner = Arc::new(FixedScanner {
        tracks: tracks(&["a"]),
        calls: AtomicUsize::new(0),
    });
    let mut h = harness_with(parts(scanner), true);

    h.cmd(Command::Play);
    h.wait_for_scan();
    assert_eq!(h.ctl.state(), PlaybackState::Idle);
    assert!(h.ctl.current().is_none());
    assert!(h.status().last_error.unwrap().contains("no device"));
}

#[test]
fn subscribers_get_current_snapshot_then_changes() {
    let (mut h, _) = harness(&["a"]);
    let (tx, rx) = mpsc::channel();
    h.ctl.handle(Msg::Subscribe(tx));
    assert_eq!(rx.try_recv().unwrap(), SessionStatus::default());

    h.start_playing();
    let last = rx.try_iter().last().unwrap();
    assert!(last.playing);
    assert_eq!(last.current.unwrap().title, "a");
}

#[test]
fn shutdown_releases_the_resource() {
    let (mut h, _) = harness(&["a"]);
    h.start_playing();
    assert!(!h.ctl.handle(Msg::Shutdown));
    assert_eq!(h.log.lock().unwrap().live, 0);
    assert_eq!(h.ctl.state(), PlaybackState::Idle);
}

#[test]
fn watchdog_fires_while_commands_keep_arriving() {
    let scanner = Arc::new(FixedScanner {
        tracks: tracks(&["a"]),
        calls: AtomicUsize::new(0),
    });
    let mut p = parts(scanner);
    p.prepare_timeout = Some(Duration::from_millis(50));
    // Idle ticks alone would never come in time.
    p.tick = Duration::from_secs(60);

    let log = SharedLog::default();
    let backend_log = log.clone();
    let engine = Engine::spawn(
        move || {
            Ok(FakeBackend {
                log: backend_log,
                refuse: false,
            })
        },
        p,
    )
    .unwrap();
    let status = engine.status_handle();

    engine.send(Command::Play).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    let timed_out = loop {
        let last_error = status.lock().unwrap().last_error.clone();
        if let Some(err) = last_error {
            break err;
        }
        assert!(Instant::now() < deadline, "watchdog never fired");
        engine.send(Command::RefreshCounts).unwrap();
        std::thread::sleep(Duration::from_millis(10));
    };

    assert!(timed_out.contains("timed out"));
    assert_eq!(status.lock().unwrap().state, PlaybackState::Idle);
    engine.shutdown();
    assert_eq!(log.lock().unwrap().live, 0);
}
