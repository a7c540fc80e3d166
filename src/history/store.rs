use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use toml::{Table, Value};
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::library::Track;

/// Key holding the array of played track ids.
pub const PLAYED_KEY: &str = "played_songs";
/// Prefix of the per-track `last_played_<id>` timestamp keys (ms since epoch).
pub const LAST_PLAYED_PREFIX: &str = "last_played_";

/// The set of tracks played in the current cycle.
///
/// Every mutation is written through to the history file when one is
/// configured. A failed write is logged and the in-memory change stands.
#[derive(Debug, Default)]
pub struct HistoryStore {
    played: HashSet<String>,
    last_played: HashMap<String, i64>,
    path: Option<PathBuf>,
}

impl HistoryStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the history file at `path`. A missing file is an empty history;
    /// an unreadable one is moved to `<name>.bad` and the store starts empty.
    /// If it cannot be moved, nothing is written for the rest of the run.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (played, last_played) = match load(&path) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "starting with empty play history");
                return Self {
                    path: set_aside(&path).then_some(path),
                    ..Self::default()
                };
            }
        };
        debug!(path = %path.display(), played = played.len(), "history loaded");

        Self {
            played,
            last_played,
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record `id` as played now. Re-marking only refreshes the timestamp.
    pub fn mark_played(&mut self, id: &str) {
        self.mark_played_at(id, Utc::now().timestamp_millis());
    }

    pub fn mark_played_at(&mut self, id: &str, timestamp_ms: i64) {
        self.played.insert(id.to_string());
        self.last_played.insert(id.to_string(), timestamp_ms);
        self.persist();
    }

    pub fn played_ids(&self) -> &HashSet<String> {
        &self.played
    }

    pub fn is_played(&self, id: &str) -> bool {
        self.played.contains(id)
    }

    pub fn last_played(&self, id: &str) -> Option<i64> {
        self.last_played.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.played.len()
    }

    pub fn is_empty(&self) -> bool {
        self.played.is_empty()
    }

    /// `library` minus the played tracks, in library order.
    pub fn unplayed<'a>(&self, library: &'a [Track]) -> Vec<&'a Track> {
        library
            .iter()
            .filter(|t| !self.played.contains(&t.id))
            .collect()
    }

    /// Forget every played id and timestamp.
    pub fn clear(&mut self) {
        self.played.clear();
        self.last_played.clear();
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        if let Err(e) = self.write(path) {
            warn!(error = %e, "history not saved, keeping it in memory");
        }
    }

    fn write(&self, path: &Path) -> Result<(), PersistenceError> {
        let io_err = |source: io::Error| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let text = toml::to_string(&self.encode())?;
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, text).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    fn encode(&self) -> Table {
        let mut ids: Vec<&String> = self.played.iter().collect();
        ids.sort();

        let mut table = Table::new();
        table.insert(
            PLAYED_KEY.to_string(),
            Value::Array(ids.into_iter().map(|id| Value::String(id.clone())).collect()),
        );
        for (id, ts) in &self.last_played {
            table.insert(format!("{LAST_PLAYED_PREFIX}{id}"), Value::Integer(*ts));
        }
        table
    }
}

type Loaded = (HashSet<String>, HashMap<String, i64>);

/// Path an unreadable history file is moved to.
pub fn set_aside_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bad");
    PathBuf::from(name)
}

/// Move an unreadable history file out of the way so the next write
/// cannot replace it. Returns whether writing to `path` is safe.
fn set_aside(path: &Path) -> bool {
    let aside = set_aside_path(path);
    match fs::rename(path, &aside) {
        Ok(()) => {
            warn!(path = %aside.display(), "unreadable history kept aside");
            true
        }
        Err(e) => {
            warn!(error = %e, "history stays in memory for this run");
            false
        }
    }
}

fn load(path: &Path) -> Result<Loaded, PersistenceError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Default::default()),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let table: Table = toml::from_str(&text).map_err(|source| PersistenceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode(&table))
}

fn decode(table: &Table) -> Loaded {
    let played: HashSet<String> = table
        .get(PLAYED_KEY)
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let last_played = table
        .iter()
        .filter_map(|(key, value)| {
            let id = key.strip_prefix(LAST_PLAYED_PREFIX)?;
            Some((id.to_string(), value.as_integer()?))
        })
        .collect();

    (played, last_played)
}
