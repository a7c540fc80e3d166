use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::ScanError;

use super::model::{FolderSet, Track};

/// Produces the track list for a folder selection.
///
/// The controller only talks to this trait so the filesystem walk can run on
/// a worker thread and be replaced in tests.
pub trait Scanner: Send + Sync {
    fn scan(&self, folders: &FolderSet) -> Vec<Track>;
}

/// Filesystem scanner backed by `walkdir`.
pub struct FsScanner {
    settings: LibrarySettings,
    /// Used when the selection is empty (music + downloads on desktop).
    default_folders: Vec<PathBuf>,
}

impl FsScanner {
    pub fn new(settings: LibrarySettings, default_folders: Vec<PathBuf>) -> Self {
        Self {
            settings,
            default_folders,
        }
    }

    fn roots(&self, folders: &FolderSet) -> Vec<PathBuf> {
        if folders.is_empty() {
            self.default_folders.clone()
        } else {
            folders.iter().cloned().collect()
        }
    }

    /// Directories under the selection that directly contain audio files.
    pub fn available_folders(&self, folders: &FolderSet) -> Vec<PathBuf> {
        let dirs: BTreeSet<PathBuf> = scan_folders(&self.roots(folders), &self.settings)
            .into_iter()
            .map(|t| t.folder)
            .collect();
        dirs.into_iter().collect()
    }
}

impl Scanner for FsScanner {
    fn scan(&self, folders: &FolderSet) -> Vec<Track> {
        scan_folders(&self.roots(folders), &self.settings)
    }
}

pub(crate) fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Scan every root, skipping the ones that cannot be read.
///
/// A directory reachable more than once (overlapping roots, several links to
/// the same tree) is only walked the first time it is seen.
pub fn scan_folders(roots: &[PathBuf], settings: &LibrarySettings) -> Vec<Track> {
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut tracks: Vec<Track> = Vec::new();

    for root in roots {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.clone());
        if !root.is_dir() {
            warn!(error = %ScanError::Missing(root.clone()), "skipping folder");
            continue;
        }

        for track in walk_root(&root, settings, &mut visited) {
            if seen_ids.insert(track.id.clone()) {
                tracks.push(track);
            }
        }
    }

    tracks.sort_by(|a, b| a.path.cmp(&b.path));
    tracks
}

fn walk_root(root: &Path, settings: &LibrarySettings, visited: &mut HashSet<PathBuf>) -> Vec<Track> {
    let mut tracks = Vec::new();

    let mut walker = WalkDir::new(root).follow_links(settings.follow_links);
    if let Some(d) = settings.max_depth {
        walker = walker.max_depth(d);
    }

    let entries = walker.into_iter().filter_entry(|e| {
        if !(settings.include_hidden || e.depth() == 0 || !is_hidden(e.path())) {
            return false;
        }
        if e.file_type().is_dir() {
            let key = e
                .path()
                .canonicalize()
                .unwrap_or_else(|_| e.path().to_path_buf());
            if !visited.insert(key) {
                debug!(path = %e.path().display(), "directory already scanned");
                return false;
            }
        }
        true
    });

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.loop_ancestor().is_some() {
                    debug!(error = %err, "symlink cycle skipped");
                } else {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(error = %ScanError::Walk { path, source: err }, "skipping entry");
                }
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_file() && is_audio_file(path, settings) {
            tracks.push(Track::from_path(path));
        }
    }

    tracks
}
