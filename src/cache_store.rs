//! Id-keyed on-disk cache of audio files and cover thumbnails.
//!
//! Entries are plain files named `<id>.<ext>`; the extension is the only
//! format marker. Lookups scan the whole directory and match the file stem
//! against the requested id exactly.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};

use log::debug;

use crate::config::CachePaths;
use crate::song::AudioFormat;

/// Cover-art extensions recognised in the thumbnail directory.
pub(crate) const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];
const PREFERRED_THUMBNAIL_EXTENSION: &str = "jpg";
const PARTIAL_SUFFIX: &str = "part";

/// A cached audio file for one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAudio {
    pub path: PathBuf,
    pub format: AudioFormat,
}

/// Cache directories plus the per-id claim table.
pub struct CacheStore {
    paths: CachePaths,
    in_flight: Mutex<HashSet<u64>>,
    released: Condvar,
}

/// Exclusive hold on one id; released on drop.
pub struct CacheClaim<'a> {
    store: &'a CacheStore,
    id: u64,
}

impl Drop for CacheClaim<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.store.lock_in_flight();
        in_flight.remove(&self.id);
        drop(in_flight);
        self.store.released.notify_all();
    }
}

impl CacheStore {
    pub fn new(paths: CachePaths) -> Self {
        Self {
            paths,
            in_flight: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks until no other caller holds `id`, then holds it until the claim is dropped.
    ///
    /// Different ids never wait on each other.
    pub fn claim(&self, id: u64) -> CacheClaim<'_> {
        let mut in_flight = self.lock_in_flight();
        while in_flight.contains(&id) {
            debug!("CacheStore: waiting for in-flight work on id {id}");
            in_flight = self
                .released
                .wait(in_flight)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        in_flight.insert(id);
        CacheClaim { store: self, id }
    }

    /// Target path for an audio file of `format`.
    pub fn audio_path(&self, id: u64, format: AudioFormat) -> PathBuf {
        self.paths
            .audio_dir
            .join(format!("{id}.{}", format.extension()))
    }

    /// Target path for a thumbnail with extension `extension`.
    pub fn thumbnail_path(&self, id: u64, extension: &str) -> PathBuf {
        self.paths.thumbnail_dir.join(format!("{id}.{extension}"))
    }

    /// Highest-fidelity cached audio file for `id`, if any.
    pub fn find_audio(&self, id: u64) -> io::Result<Option<CachedAudio>> {
        let best = entries_for_id(&self.paths.audio_dir, id)?
            .into_iter()
            .filter_map(|(path, extension)| {
                AudioFormat::from_extension(&extension).map(|format| CachedAudio { path, format })
            })
            .max_by_key(|cached| cached.format.fidelity_rank());
        Ok(best)
    }

    /// Cached thumbnail for `id`, preferring the re-encoded JPEG over an original.
    pub fn find_thumbnail(&self, id: u64) -> io::Result<Option<PathBuf>> {
        let mut candidates: Vec<(PathBuf, String)> =
            entries_for_id(&self.paths.thumbnail_dir, id)?
                .into_iter()
                .filter(|(_, extension)| IMAGE_EXTENSIONS.contains(&extension.as_str()))
                .collect();
        candidates.sort_by_key(|(_, extension)| extension != PREFERRED_THUMBNAIL_EXTENSION);
        Ok(candidates.into_iter().next().map(|(path, _)| path))
    }

    /// Deletes every lossy audio representation of `id`. Returns the removed paths.
    pub fn remove_lossy_audio(&self, id: u64) -> io::Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for (path, extension) in entries_for_id(&self.paths.audio_dir, id)? {
            let Some(format) = AudioFormat::from_extension(&extension) else {
                continue;
            };
            if format.is_lossless() {
                continue;
            }
            fs::remove_file(&path)?;
            removed.push(path);
        }
        Ok(removed)
    }
}

/// Files in `dir` whose stem is exactly `id`, with their lower-cased extension.
fn entries_for_id(dir: &Path, id: u64) -> io::Result<Vec<(PathBuf, String)>> {
    let wanted_stem = id.to_string();
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        let stem_matches = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem == wanted_stem);
        if !stem_matches {
            continue;
        }
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        let extension = extension.to_ascii_lowercase();
        matches.push((path, extension));
    }
    Ok(matches)
}

/// Writes `bytes` to a sibling `.part` file and renames it over `target_path`.
///
/// A failure leaves nothing at `target_path`.
pub fn write_file_atomic(target_path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut temp_name = target_path.as_os_str().to_os_string();
    temp_name.push(".");
    temp_name.push(PARTIAL_SUFFIX);
    let temp_path = PathBuf::from(temp_name);
    if temp_path.exists() {
        let _ = fs::remove_file(&temp_path);
    }
    if let Err(err) = fs::write(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    fs::rename(&temp_path, target_path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}
