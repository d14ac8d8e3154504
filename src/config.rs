//! Persistent application configuration model and defaults.

use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

const APP_DIR_NAME: &str = "songvault";
const THUMBNAIL_DIR_NAME: &str = "img";

/// Errors raised while loading or materializing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no cache root configured and no user cache directory available")]
    NoCacheRoot,
    #[error("no config path given and no user config directory available")]
    NoConfigDir,
}

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Process-level preferences.
    pub general: GeneralConfig,
    #[serde(default)]
    /// Remote catalog connection settings.
    pub catalog: CatalogConfig,
    #[serde(default)]
    /// Local cache layout.
    pub cache: CacheConfig,
}

/// Process-level preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    /// Size of the request worker pool.
    #[serde(default = "default_threads")]
    pub threads: usize,
}

/// Log verbosity selectable from the config file.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// Remote catalog connection settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Session credential sent as the `MUSIC_U` cookie. Empty means "ask the keyring".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_token: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

/// Local cache layout.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CacheConfig {
    /// Audio cache directory. Thumbnails live in its `img/` child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default = "default_thumbnail_max_edge_px")]
    pub thumbnail_max_edge_px: u32,
}

/// Cache directories resolved from `CacheConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub audio_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
}

impl CachePaths {
    pub fn from_root(root: &Path) -> Self {
        Self {
            audio_dir: root.to_path_buf(),
            thumbnail_dir: root.join(THUMBNAIL_DIR_NAME),
        }
    }

    /// Creates both cache directories if they are missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.audio_dir)?;
        std::fs::create_dir_all(&self.thumbnail_dir)
    }
}

impl CacheConfig {
    /// Returns the configured root, or `<user cache dir>/songvault`.
    pub fn resolved_paths(&self) -> Result<CachePaths, ConfigError> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => dirs::cache_dir()
                .map(|path| path.join(APP_DIR_NAME))
                .ok_or(ConfigError::NoCacheRoot)?,
        };
        Ok(CachePaths::from_root(&root))
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            threads: default_threads(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_token: String::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            thumbnail_max_edge_px: default_thumbnail_max_edge_px(),
        }
    }
}

fn default_threads() -> usize {
    4
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_thumbnail_max_edge_px() -> u32 {
    crate::image_pipeline::DEFAULT_THUMBNAIL_MAX_EDGE_PX
}

/// Default location of `config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|path| path.join(APP_DIR_NAME).join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Clamps values that would make the runtime misbehave.
pub fn sanitize_config(config: Config) -> Config {
    Config {
        general: GeneralConfig {
            threads: config.general.threads.clamp(1, 64),
            ..config.general
        },
        catalog: CatalogConfig {
            base_url: config.catalog.base_url.trim().to_string(),
            session_token: config.catalog.session_token.trim().to_string(),
            connect_timeout_secs: config.catalog.connect_timeout_secs.max(1),
            read_timeout_secs: config.catalog.read_timeout_secs.max(1),
        },
        cache: CacheConfig {
            thumbnail_max_edge_px: config.cache.thumbnail_max_edge_px.max(1),
            ..config.cache
        },
    }
}

/// Reads `path`, creating it with defaults first when it does not exist.
pub fn load_or_create(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = toml::to_string(&Config::default())?;
        std::fs::write(path, serialized).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = toml::from_str::<Config>(&content)?;
    Ok(sanitize_config(parsed))
}

#[cfg(test)]
mod tests {
    use super::{load_or_create, sanitize_config, CachePaths, Config, LogLevel};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_path(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be valid")
            .as_nanos();
        std::env::temp_dir().join(format!("songvault_{name}_{nonce}"))
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[general]
log_level = "warning"
threads = 8

[catalog]
base_url = "http://music.local:3000/"
session_token = "abc123"

[cache]
root = "/tmp/songvault"
thumbnail_max_edge_px = 256
"#;
        let config: Config = toml::from_str(toml_str).expect("config should parse");
        assert_eq!(config.general.log_level, LogLevel::Warn);
        assert_eq!(config.general.threads, 8);
        assert_eq!(config.catalog.session_token, "abc123");
        assert_eq!(config.catalog.connect_timeout_secs, 5);
        assert_eq!(config.cache.root, Some(PathBuf::from("/tmp/songvault")));
        assert_eq!(config.cache.thumbnail_max_edge_px, 256);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.cache.thumbnail_max_edge_px, 320);
        assert_eq!(config.general.threads, 4);
    }

    #[test]
    fn test_sanitize_clamps_thread_count_and_trims_token() {
        let mut config = Config::default();
        config.general.threads = 0;
        config.catalog.session_token = "  token \n".to_string();
        config.cache.thumbnail_max_edge_px = 0;

        let sanitized = sanitize_config(config);
        assert_eq!(sanitized.general.threads, 1);
        assert_eq!(sanitized.catalog.session_token, "token");
        assert_eq!(sanitized.cache.thumbnail_max_edge_px, 1);
    }

    #[test]
    fn test_cache_paths_put_thumbnails_under_img() {
        let paths = CachePaths::from_root(&PathBuf::from("/srv/cache"));
        assert_eq!(paths.audio_dir, PathBuf::from("/srv/cache"));
        assert_eq!(paths.thumbnail_dir, PathBuf::from("/srv/cache/img"));
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = unique_temp_path("config");
        let path = dir.join("config.toml");

        let config = load_or_create(&path).expect("default config should be created");
        assert!(path.exists());
        assert_eq!(config, Config::default());

        std::fs::remove_dir_all(dir).expect("fixture should be removable");
    }
}
