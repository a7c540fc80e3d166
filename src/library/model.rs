use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// The set of root folders a library is scanned from.
pub type FolderSet = BTreeSet<PathBuf>;

/// One playable audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Stable identity derived from the absolute path.
    pub id: String,
    pub title: String,
    pub path: PathBuf,
    pub folder: PathBuf,
}

impl Track {
    /// Build a track for `path`, which should already be absolute.
    pub fn from_path(path: &Path) -> Self {
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_string();
        let folder = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            id: track_id(path),
            title,
            path: path.to_path_buf(),
            folder,
        }
    }
}

/// Hex SHA-256 of the path's raw bytes, truncated to 16 bytes.
pub fn track_id(path: &Path) -> String {
    let digest = Sha256::digest(path.as_os_str().as_encoded_bytes());
    hex::encode(&digest[..16])
}
