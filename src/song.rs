//! Resolved-song and cached-location payloads shared by the resolver, the
//! cache orchestrator, and delivery front ends.

use std::fmt;
use std::path::PathBuf;

/// Audio container formats the catalog can hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// Lossless container.
    Flac,
    /// Lossy-compressed container.
    Mp3,
    M4a,
}

impl AudioFormat {
    /// Parses a catalog `type` value or a file extension. Case-insensitive.
    pub fn from_extension(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "flac" => Some(Self::Flac),
            "mp3" => Some(Self::Mp3),
            "m4a" => Some(Self::M4a),
            _ => None,
        }
    }

    /// Lower-cased file extension used for cache file names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, Self::Flac)
    }

    /// Higher value wins when more than one representation of an id is cached.
    pub(crate) fn fidelity_rank(self) -> u8 {
        match self {
            Self::Flac => 2,
            Self::Mp3 | Self::M4a => 1,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A catalog entry picked by the resolver for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub name: String,
    /// All credited artists joined with `&`.
    pub artist: String,
    /// Catalog-assigned id, also the cache key.
    pub id: u64,
    pub format: AudioFormat,
    pub album: String,
    /// Stream URL. `None` when the song was resolved from the local cache.
    pub url: Option<String>,
}

impl Song {
    /// `true` when the resolver short-circuited on a cached file.
    pub fn is_cached(&self) -> bool {
        self.url.is_none()
    }
}

/// Files produced for a song, ready to be handed to a delivery layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub song: PathBuf,
    pub thumb: Option<PathBuf>,
}
