//! Source polling for the target build loops.
//!
//! Each scan records the mtime and length of every file under a target's watch root. Two scans
//! differ when a file was added, removed or edited. Output directories and `.git` are never
//! scanned, otherwise a finished build would queue the next one.

use rustc_hash::{FxHashMap, FxHasher};
use std::fs::{self, Metadata};
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileFingerprint {
    pub modified: SystemTime,
    pub len: u64,
}

impl FileFingerprint {
    fn from_metadata(metadata: &Metadata) -> Self {
        FileFingerprint {
            // Filesystems without mtimes still report length changes.
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            len: metadata.len(),
        }
    }
}

pub type Fingerprints = FxHashMap<PathBuf, FileFingerprint>;

/// Scans `watch_root` breadth first. A missing root is an error; anything that vanishes
/// below it while the scan runs is left for the next poll.
pub fn collect_fingerprints(
    watch_root: &Path,
    ignored_dirs: &[PathBuf],
) -> io::Result<Fingerprints> {
    let mut fingerprints = Fingerprints::default();
    if should_ignore_path(watch_root, ignored_dirs) {
        return Ok(fingerprints);
    }

    let mut pending_dirs = vec![watch_root.to_path_buf()];
    while let Some(dir) = pending_dirs.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if dir != watch_root && is_gone(&error) => continue,
            Err(error) => return Err(error),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if should_ignore_path(&path, ignored_dirs) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(error) if is_gone(&error) => continue,
                Err(error) => return Err(error),
            };

            if metadata.is_dir() {
                pending_dirs.push(path);
            } else if metadata.is_file() {
                fingerprints.insert(path, FileFingerprint::from_metadata(&metadata));
            }
        }
    }

    Ok(fingerprints)
}

fn is_gone(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::NotFound
}

pub fn detect_changes(previous: &Fingerprints, current: &Fingerprints) -> bool {
    previous.len() != current.len()
        || current
            .iter()
            .any(|(path, fingerprint)| previous.get(path) != Some(fingerprint))
}

/// True once the sources have been quiet for a full window since they first changed.
pub fn debounce_elapsed(first_change: Option<Instant>, window: Duration) -> bool {
    first_change.is_some_and(|changed_at| changed_at.elapsed() >= window)
}

pub fn should_ignore_path(path: &Path, ignored_dirs: &[PathBuf]) -> bool {
    let inside_git = path
        .components()
        .any(|component| matches!(component, Component::Normal(name) if name == ".git"));

    inside_git || ignored_dirs.iter().any(|dir| path.starts_with(dir))
}

/// Digest of a scan that does not depend on map iteration order.
pub fn fingerprint_digest(fingerprints: &Fingerprints) -> u64 {
    let mut entries: Vec<(&PathBuf, &FileFingerprint)> = fingerprints.iter().collect();
    entries.sort_unstable_by_key(|(path, _)| *path);

    let mut hasher = FxHasher::default();
    for (path, fingerprint) in entries {
        path.hash(&mut hasher);
        fingerprint.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
#[path = "tests/watch_tests.rs"]
mod tests;
