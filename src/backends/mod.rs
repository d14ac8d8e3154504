//! Remote catalog abstractions and concrete implementations.

pub mod credential_keyring;
#[cfg(test)]
pub(crate) mod fake;
pub mod netease;

use thiserror::Error;

/// Any transport failure or unexpected payload while talking to the catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("catalog unavailable ({endpoint}): {reason}")]
pub struct CatalogError {
    pub endpoint: String,
    pub reason: String,
}

impl CatalogError {
    pub fn new(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

/// One search result, in the order the catalog returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogHit {
    pub id: u64,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
}

impl CatalogHit {
    /// Artist credit as shown to users, e.g. `A&B`.
    pub fn joined_artists(&self) -> String {
        self.artists.join("&")
    }
}

/// Streaming details for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub url: Option<String>,
    /// Container type as reported by the catalog, lower-cased.
    pub container_format: String,
    /// Only a preview clip is streamable for this account.
    pub trial_only: bool,
}

impl StreamInfo {
    /// Playable URL, if the stream can be cached in full.
    pub fn playable_url(&self) -> Option<&str> {
        if self.trial_only {
            return None;
        }
        self.url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Read-only catalog operations used by the resolver and the cache pipeline.
///
/// Every call is a single blocking attempt; callers own any retry policy.
pub trait MusicCatalog: Send + Sync {
    fn search(&self, keyword: &str) -> Result<Vec<CatalogHit>, CatalogError>;
    fn check_license(&self, id: u64) -> Result<bool, CatalogError>;
    fn stream_info(&self, id: u64) -> Result<StreamInfo, CatalogError>;
    fn cover_url(&self, id: u64) -> Result<String, CatalogError>;
    /// Downloads a media URL (audio stream or cover image) without credentials.
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::{CatalogHit, StreamInfo};

    #[test]
    fn test_joined_artists_uses_ampersand() {
        let hit = CatalogHit {
            id: 1,
            name: "Song".to_string(),
            artists: vec!["A".to_string(), "B".to_string()],
            album: "Album".to_string(),
        };
        assert_eq!(hit.joined_artists(), "A&B");
    }

    #[test]
    fn test_trial_only_stream_is_not_playable() {
        let trial = StreamInfo {
            url: Some("http://x/1.mp3".to_string()),
            container_format: "mp3".to_string(),
            trial_only: true,
        };
        assert_eq!(trial.playable_url(), None);

        let missing = StreamInfo {
            url: None,
            container_format: "mp3".to_string(),
            trial_only: false,
        };
        assert_eq!(missing.playable_url(), None);

        let full = StreamInfo {
            url: Some("http://x/1.mp3".to_string()),
            container_format: "mp3".to_string(),
            trial_only: false,
        };
        assert_eq!(full.playable_url(), Some("http://x/1.mp3"));
    }
}
