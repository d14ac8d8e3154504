//! In-memory catalog used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::backends::{CatalogError, CatalogHit, MusicCatalog, StreamInfo};

/// Scripted catalog that records every call it receives.
#[derive(Default)]
pub struct FakeCatalog {
    pub hits: Vec<CatalogHit>,
    pub search_fails: bool,
    pub licensed: HashMap<u64, bool>,
    pub streams: HashMap<u64, StreamInfo>,
    pub covers: HashMap<u64, String>,
    pub downloads: HashMap<String, Vec<u8>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn hit(id: u64, name: &str) -> CatalogHit {
        CatalogHit {
            id,
            name: name.to_string(),
            artists: vec!["Artist".to_string()],
            album: "Album".to_string(),
        }
    }

    pub fn playable_stream(url: &str, format: &str) -> StreamInfo {
        StreamInfo {
            url: Some(url.to_string()),
            container_format: format.to_string(),
            trial_only: false,
        }
    }

    /// Calls made so far, e.g. `["search:x", "check:7", "stream:7"]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

impl MusicCatalog for FakeCatalog {
    fn search(&self, keyword: &str) -> Result<Vec<CatalogHit>, CatalogError> {
        self.record(format!("search:{keyword}"));
        if self.search_fails {
            return Err(CatalogError::new("/search", "connection refused"));
        }
        Ok(self.hits.clone())
    }

    fn check_license(&self, id: u64) -> Result<bool, CatalogError> {
        self.record(format!("check:{id}"));
        Ok(self.licensed.get(&id).copied().unwrap_or(false))
    }

    fn stream_info(&self, id: u64) -> Result<StreamInfo, CatalogError> {
        self.record(format!("stream:{id}"));
        self.streams
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::new("/song/url", "missing data[0]"))
    }

    fn cover_url(&self, id: u64) -> Result<String, CatalogError> {
        self.record(format!("cover:{id}"));
        self.covers
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::new("/song/detail", "missing picUrl"))
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        self.record(format!("fetch:{url}"));
        self.downloads
            .get(url)
            .cloned()
            .ok_or_else(|| CatalogError::new(url, "HTTP 404"))
    }
}
