//! Console delivery: runs one request through the pipeline and reports it.

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::cache_orchestrator::CacheOrchestrator;
use crate::resolver::SongResolver;
use crate::song::{Location, Song};

/// What the user is told about one keyword request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SearchFailed { keyword: String },
    NotFound { keyword: String },
    CachingFailed { song: Song },
    Ready { song: Song, location: Location },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SearchFailed { keyword } => {
                write!(f, "search for \"{keyword}\" failed, please retry")
            }
            Self::NotFound { keyword } => {
                write!(f, "\"{keyword}\" could not be found or is not licensed")
            }
            Self::CachingFailed { song } => {
                write!(f, "\"{}\" could not be cached, please retry", song.name)
            }
            Self::Ready { song, location } => {
                write!(
                    f,
                    "\"{}\" by {} ready: {}",
                    song.name,
                    song.artist,
                    location.song.display()
                )?;
                if let Some(thumb) = &location.thumb {
                    write!(f, " (cover {})", thumb.display())?;
                }
                Ok(())
            }
        }
    }
}

/// Shared entry point for the CLI commands and the `serve` workers.
pub struct RequestHandler {
    resolver: SongResolver,
    orchestrator: CacheOrchestrator,
}

impl RequestHandler {
    pub fn new(resolver: SongResolver, orchestrator: CacheOrchestrator) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            orchestrator,
        })
    }

    pub fn resolver(&self) -> &SongResolver {
        &self.resolver
    }

    /// Resolves and caches `keyword`, absorbing every failure into an `Outcome`.
    pub fn handle(&self, keyword: &str) -> Outcome {
        let keyword = keyword.trim().to_string();
        let song = match self.resolver.resolve(&keyword) {
            Ok(Some(song)) => song,
            Ok(None) => {
                warn!("Delivery: {keyword:?} is not found");
                return Outcome::NotFound { keyword };
            }
            Err(err) => {
                error!("Delivery: search for {keyword:?} cannot be performed");
                debug!("Delivery: {err}");
                return Outcome::SearchFailed { keyword };
            }
        };

        match self.orchestrator.cache_song(&song) {
            Ok(location) => {
                info!(
                    "Delivery: {} - {} is ready at {}",
                    song.name,
                    song.artist,
                    location.song.display()
                );
                Outcome::Ready { song, location }
            }
            Err(err) => {
                error!("Delivery: {} - {} could not be cached", song.name, song.artist);
                debug!("Delivery: {err}");
                Outcome::CachingFailed { song }
            }
        }
    }
}
