//! Time-bounded memo of the last scan.
//!
//! A read is only served when the snapshot is younger than the TTL and was
//! taken for exactly the folder set being asked about.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::model::{FolderSet, Track};
use super::scan::Scanner;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

struct Snapshot {
    tracks: Arc<[Track]>,
    scanned_at: Instant,
    folders: FolderSet,
}

pub struct LibraryCache {
    snapshot: Option<Snapshot>,
    ttl: Duration,
}

impl Default for LibraryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl LibraryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshot: None,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached tracks, if still valid for `folders` at `now`.
    pub fn get_at(&self, folders: &FolderSet, now: Instant) -> Option<Arc<[Track]>> {
        let snap = self.snapshot.as_ref()?;
        let age = now.saturating_duration_since(snap.scanned_at);
        if age < self.ttl && &snap.folders == folders {
            Some(Arc::clone(&snap.tracks))
        } else {
            None
        }
    }

    pub fn get(&self, folders: &FolderSet) -> Option<Arc<[Track]>> {
        self.get_at(folders, Instant::now())
    }

    /// Replace the snapshot wholesale.
    pub fn store_at(
        &mut self,
        folders: FolderSet,
        tracks: impl Into<Arc<[Track]>>,
        now: Instant,
    ) -> Arc<[Track]> {
        let tracks = tracks.into();
        self.snapshot = Some(Snapshot {
            tracks: Arc::clone(&tracks),
            scanned_at: now,
            folders,
        });
        tracks
    }

    pub fn store(&mut self, folders: FolderSet, tracks: impl Into<Arc<[Track]>>) -> Arc<[Track]> {
        self.store_at(folders, tracks, Instant::now())
    }

    pub fn get_or_scan_at(
        &mut self,
        folders: &FolderSet,
        scanner: &dyn Scanner,
        now: Instant,
    ) -> Arc<[Track]> {
        if let Some(tracks) = self.get_at(folders, now) {
            return tracks;
        }
        let tracks = scanner.scan(folders);
        self.store_at(folders.clone(), tracks, now)
    }

    /// Serve from the cache or scan synchronously on the calling thread.
    pub fn get_or_scan(&mut self, folders: &FolderSet, scanner: &dyn Scanner) -> Arc<[Track]> {
        self.get_or_scan_at(folders, scanner, Instant::now())
    }

    /// Force the next read to rescan.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }
}
