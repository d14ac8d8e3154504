//! NetEase-compatible catalog client backed by `ureq`.

use std::io::Read;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::backends::{CatalogError, CatalogHit, MusicCatalog, StreamInfo};
use crate::config::CatalogConfig;

const SESSION_COOKIE_NAME: &str = "MUSIC_U";
const SEARCH_TYPE_SINGLE_TRACK: &str = "1";

/// Catalog client that authenticates every call with a fixed session cookie.
pub struct NeteaseCatalog {
    http_client: ureq::Agent,
    base_url: String,
    session_token: String,
}

impl NeteaseCatalog {
    /// Creates a client for `config.base_url` using `session_token` as the cookie value.
    pub fn new(config: &CatalogConfig, session_token: String) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout_read(Duration::from_secs(config.read_timeout_secs))
            .timeout_write(Duration::from_secs(config.read_timeout_secs))
            .build();
        Self {
            http_client,
            base_url: Self::endpoint_base(&config.base_url),
            session_token,
        }
    }

    fn endpoint_base(endpoint: &str) -> String {
        endpoint.trim().trim_end_matches('/').to_string()
    }

    /// Encodes a `+`-joined keyword term by term so `+` keeps meaning "space".
    fn encode_keyword(keyword: &str) -> String {
        keyword
            .split('+')
            .map(|term| urlencoding::encode(term).into_owned())
            .collect::<Vec<_>>()
            .join("+")
    }

    fn api_url(&self, path: &str, query: &[(&str, String)]) -> String {
        let query_parts: Vec<String> = query
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        format!("{}{}?{}", self.base_url, path, query_parts.join("&"))
    }

    fn request_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, CatalogError> {
        let url = self.api_url(path, query);
        let cookie = format!("{SESSION_COOKIE_NAME}={}", self.session_token);
        let response = match self.http_client.get(&url).set("Cookie", &cookie).call() {
            Ok(response) => response,
            // Some endpoints answer with a 4xx status and a JSON body describing the outcome.
            Err(ureq::Error::Status(code, response)) => {
                debug!("Catalog {path} answered with HTTP {code}; reading body as JSON");
                response
            }
            Err(err) => {
                return Err(CatalogError::new(path, format!("request failed: {err}")));
            }
        };
        response
            .into_json::<Value>()
            .map_err(|err| CatalogError::new(path, format!("response parse failed: {err}")))
    }

    pub(crate) fn parse_search_hits(payload: &Value) -> Result<Vec<CatalogHit>, String> {
        let result = payload
            .get("result")
            .ok_or_else(|| "search response missing `result`".to_string())?;
        let songs = match result.get("songs") {
            Some(Value::Array(songs)) => songs,
            // An empty result set omits `songs` entirely.
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(_) => return Err("search `result.songs` is not an array".to_string()),
        };
        songs.iter().map(Self::parse_hit).collect()
    }

    fn parse_hit(song: &Value) -> Result<CatalogHit, String> {
        let id = song
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| "search hit missing numeric `id`".to_string())?;
        let name = song
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let artists = song
            .get("artists")
            .and_then(Value::as_array)
            .map(|artists| {
                artists
                    .iter()
                    .filter_map(|artist| artist.get("name").and_then(Value::as_str))
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let album = song
            .get("album")
            .and_then(|album| album.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(CatalogHit {
            id,
            name,
            artists,
            album,
        })
    }

    pub(crate) fn parse_license(payload: &Value) -> Result<bool, String> {
        payload
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| "license response missing boolean `success`".to_string())
    }

    pub(crate) fn parse_stream_info(payload: &Value) -> Result<StreamInfo, String> {
        let entry = payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|data| data.first())
            .ok_or_else(|| "stream response missing `data[0]`".to_string())?;
        let url = entry
            .get("url")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        let container_format = entry
            .get("type")
            .and_then(Value::as_str)
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let trial_only = entry
            .get("freeTrialInfo")
            .is_some_and(|value| !value.is_null());
        Ok(StreamInfo {
            url,
            container_format,
            trial_only,
        })
    }

    pub(crate) fn parse_cover_url(payload: &Value) -> Result<String, String> {
        payload
            .get("songs")
            .and_then(Value::as_array)
            .and_then(|songs| songs.first())
            .and_then(|song| song.get("al"))
            .and_then(|album| album.get("picUrl"))
            .and_then(Value::as_str)
            .filter(|url| !url.trim().is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| "detail response missing `songs[0].al.picUrl`".to_string())
    }
}

impl MusicCatalog for NeteaseCatalog {
    fn search(&self, keyword: &str) -> Result<Vec<CatalogHit>, CatalogError> {
        const PATH: &str = "/search";
        let payload = self.request_json(
            PATH,
            &[
                ("keywords", Self::encode_keyword(keyword)),
                ("type", SEARCH_TYPE_SINGLE_TRACK.to_string()),
            ],
        )?;
        Self::parse_search_hits(&payload).map_err(|reason| CatalogError::new(PATH, reason))
    }

    fn check_license(&self, id: u64) -> Result<bool, CatalogError> {
        const PATH: &str = "/check/music";
        let payload = self.request_json(PATH, &[("id", id.to_string())])?;
        Self::parse_license(&payload).map_err(|reason| CatalogError::new(PATH, reason))
    }

    fn stream_info(&self, id: u64) -> Result<StreamInfo, CatalogError> {
        const PATH: &str = "/song/url";
        let payload = self.request_json(PATH, &[("id", id.to_string())])?;
        Self::parse_stream_info(&payload).map_err(|reason| CatalogError::new(PATH, reason))
    }

    fn cover_url(&self, id: u64) -> Result<String, CatalogError> {
        const PATH: &str = "/song/detail";
        let payload = self.request_json(PATH, &[("ids", id.to_string())])?;
        Self::parse_cover_url(&payload).map_err(|reason| CatalogError::new(PATH, reason))
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let response = self
            .http_client
            .get(url)
            .call()
            .map_err(|err| CatalogError::new(url, format!("download failed: {err}")))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| CatalogError::new(url, format!("failed to read body: {err}")))?;
        Ok(bytes)
    }
}
