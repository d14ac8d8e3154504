//! Keyword to `Song` resolution against the catalog and the local cache.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::backends::{CatalogError, CatalogHit, MusicCatalog};
use crate::cache_store::CacheStore;
use crate::song::{AudioFormat, Song};

/// Picks the first usable catalog hit for a keyword.
pub struct SongResolver {
    catalog: Arc<dyn MusicCatalog>,
    store: Arc<CacheStore>,
}

/// Spaces become `+`, the separator the catalog search expects.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().replace(' ', "+")
}

fn song_from_hit(hit: &CatalogHit, format: AudioFormat, url: Option<String>) -> Song {
    Song {
        name: hit.name.clone(),
        artist: hit.joined_artists(),
        id: hit.id,
        format,
        album: hit.album.clone(),
        url,
    }
}

impl SongResolver {
    pub fn new(catalog: Arc<dyn MusicCatalog>, store: Arc<CacheStore>) -> Self {
        Self { catalog, store }
    }

    /// Resolves `keyword` to a song, preferring hits that are already cached.
    ///
    /// `Ok(None)` means nothing in the result list is licensed and fully
    /// streamable. Transport failures surface as `Err`.
    pub fn resolve(&self, keyword: &str) -> Result<Option<Song>, CatalogError> {
        let query = normalize_keyword(keyword);
        let hits = self.catalog.search(&query)?;
        debug!("Resolver: {} hit(s) for {query:?}", hits.len());

        for hit in &hits {
            if let Some(song) = self.resolve_hit(hit)? {
                return Ok(Some(song));
            }
        }

        info!("Resolver: no usable hit for {query:?}");
        Ok(None)
    }

    fn resolve_hit(&self, hit: &CatalogHit) -> Result<Option<Song>, CatalogError> {
        match self.store.find_audio(hit.id) {
            Ok(Some(cached)) => {
                debug!(
                    "Resolver: cache hit for {} at {}",
                    hit.id,
                    cached.path.display()
                );
                return Ok(Some(song_from_hit(hit, cached.format, None)));
            }
            Ok(None) => {}
            Err(err) => warn!("Resolver: cache scan for {} failed: {err}", hit.id),
        }

        if !self.catalog.check_license(hit.id)? {
            debug!("Resolver: {} is not licensed", hit.id);
            return Ok(None);
        }

        let stream = self.catalog.stream_info(hit.id)?;
        let Some(url) = stream.playable_url() else {
            debug!(
                "Resolver: {} has no full stream (trial_only={})",
                hit.id, stream.trial_only
            );
            return Ok(None);
        };
        let Some(format) = AudioFormat::from_extension(&stream.container_format) else {
            warn!(
                "Resolver: {} has unsupported format {:?}",
                hit.id, stream.container_format
            );
            return Ok(None);
        };

        Ok(Some(song_from_hit(hit, format, Some(url.to_string()))))
    }
}
