//! Turns a resolved `Song` into cached, tagged files on disk.

use std::io;
use std::sync::Arc;

use log::{debug, error, info};
use thiserror::Error;

use crate::backends::MusicCatalog;
use crate::cache_store::{write_file_atomic, CacheStore};
use crate::image_pipeline::ThumbnailProcessor;
use crate::metadata::tag_writer::{write_tags, TrackTags};
use crate::song::{Location, Song};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("download failed for {id}: {reason}")]
    DownloadFailed { id: u64, reason: String },
    #[error("cache I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub struct CacheOrchestrator {
    catalog: Arc<dyn MusicCatalog>,
    store: Arc<CacheStore>,
    thumbnails: ThumbnailProcessor,
}

impl CacheOrchestrator {
    pub fn new(
        catalog: Arc<dyn MusicCatalog>,
        store: Arc<CacheStore>,
        thumbnail_max_edge_px: u32,
    ) -> Self {
        let thumbnails =
            ThumbnailProcessor::new(catalog.clone(), store.clone(), thumbnail_max_edge_px);
        Self {
            catalog,
            store,
            thumbnails,
        }
    }

    /// Ensures `song` and its thumbnail are cached, downloading and tagging
    /// the audio only when no cached copy of equal or higher fidelity exists.
    ///
    /// Thumbnail and tag failures are logged and never fail the call.
    pub fn cache_song(&self, song: &Song) -> Result<Location, CacheError> {
        let _claim = self.store.claim(song.id);

        if song.format.is_lossless() {
            for removed in self.store.remove_lossy_audio(song.id)? {
                info!(
                    "CacheOrchestrator: replaced lossy copy {}",
                    removed.display()
                );
            }
        }
        let cached = self
            .store
            .find_audio(song.id)?
            .filter(|cached| cached.format.fidelity_rank() >= song.format.fidelity_rank());

        let thumb = match self.thumbnails.cache_thumbnail(song.id) {
            Ok(path) => Some(path),
            Err(err) => {
                error!("CacheOrchestrator: no thumbnail for {}", song.id);
                debug!("CacheOrchestrator: thumbnail failure for {}: {err}", song.id);
                None
            }
        };

        if let Some(cached) = cached {
            debug!(
                "CacheOrchestrator: {} already cached at {}",
                song.id,
                cached.path.display()
            );
            return Ok(Location {
                song: cached.path,
                thumb,
            });
        }

        let Some(url) = song.url.as_deref() else {
            return Err(CacheError::DownloadFailed {
                id: song.id,
                reason: "no stream url and no cached file".to_string(),
            });
        };
        let bytes = self
            .catalog
            .fetch_bytes(url)
            .map_err(|err| CacheError::DownloadFailed {
                id: song.id,
                reason: err.to_string(),
            })?;
        if bytes.is_empty() {
            return Err(CacheError::DownloadFailed {
                id: song.id,
                reason: "empty response body".to_string(),
            });
        }
        let target_path = self.store.audio_path(song.id, song.format);
        write_file_atomic(&target_path, &bytes)?;
        info!(
            "CacheOrchestrator: cached {} ({} bytes) at {}",
            song.id,
            bytes.len(),
            target_path.display()
        );

        let tags = TrackTags {
            title: &song.name,
            artist: &song.artist,
            album: &song.album,
        };
        if let Err(err) = write_tags(&target_path, song.format, tags, thumb.as_deref()) {
            error!("CacheOrchestrator: failed to tag {}", target_path.display());
            debug!("CacheOrchestrator: {err}");
        }

        Ok(Location {
            song: target_path,
            thumb,
        })
    }
}
