//! Keyword-driven song caching: resolve a catalog hit, cache its audio and
//! cover art on disk, and tag the cached file.

pub mod app_bootstrap;
pub mod backends;
pub mod cache_orchestrator;
pub mod cache_store;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod image_pipeline;
pub mod metadata;
pub mod resolver;
pub mod song;
pub mod worker_pool;
