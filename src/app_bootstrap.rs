//! Startup wiring: logging, cache directories, and the request pipeline.

use std::any::Any;
use std::sync::Arc;

use log::LevelFilter;
use thiserror::Error;

use crate::backends::credential_keyring;
use crate::backends::netease::NeteaseCatalog;
use crate::backends::MusicCatalog;
use crate::cache_orchestrator::CacheOrchestrator;
use crate::cache_store::CacheStore;
use crate::config::{CachePaths, Config, ConfigError};
use crate::delivery::RequestHandler;
use crate::resolver::SongResolver;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Credential(String),
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

/// Installs `colog` at `level` and routes panics through the logger.
pub fn init_logging(level: LevelFilter) {
    let mut clog = colog::default_builder();
    clog.filter(None, level);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!(
            "panic in thread '{}': {}",
            thread_name,
            panic_payload_to_string(panic_info.payload())
        );
        if let Some(location) = panic_info.location() {
            log::debug!("panic location: {location}");
        }
    }));
}

/// Resolves the cache layout, creates the root and its `img/` child, and
/// returns absolute paths for both.
pub fn prepare_cache_dirs(config: &Config) -> Result<CachePaths, BootstrapError> {
    let configured = config.cache.resolved_paths()?;
    for dir in [&configured.audio_dir, &configured.thumbnail_dir] {
        std::fs::create_dir_all(dir).map_err(|source| BootstrapError::CacheDir {
            path: dir.clone(),
            source,
        })?;
    }
    let root = std::fs::canonicalize(&configured.audio_dir).map_err(|source| {
        BootstrapError::CacheDir {
            path: configured.audio_dir.clone(),
            source,
        }
    })?;
    Ok(CachePaths::from_root(&root))
}

/// Wires the resolver and the cache orchestrator around one shared catalog
/// client and cache store.
pub fn build_request_handler(
    config: &Config,
    catalog: Arc<dyn MusicCatalog>,
    paths: CachePaths,
) -> Arc<RequestHandler> {
    let store = Arc::new(CacheStore::new(paths));
    RequestHandler::new(
        SongResolver::new(Arc::clone(&catalog), Arc::clone(&store)),
        CacheOrchestrator::new(catalog, store, config.cache.thumbnail_max_edge_px),
    )
}

/// Builds the production pipeline: NetEase client plus on-disk cache.
pub fn bootstrap(config: &Config) -> Result<Arc<RequestHandler>, BootstrapError> {
    let paths = prepare_cache_dirs(config)?;
    let session_token = credential_keyring::resolve_session_token(&config.catalog)
        .map_err(BootstrapError::Credential)?;
    let catalog: Arc<dyn MusicCatalog> =
        Arc::new(NeteaseCatalog::new(&config.catalog, session_token));
    log::info!(
        "Bootstrap: catalog {} with cache root {}",
        config.catalog.base_url,
        paths.audio_dir.display()
    );
    Ok(build_request_handler(config, catalog, paths))
}
