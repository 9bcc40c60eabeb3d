//!
//! src/fetch.rs  Andrew Belles  Oct 4th, 2025
//!
//! Defines the catalog client seam the harvester drives, and the
//! Spotify-backed clients for playlist tracks and audio features
//!

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, header, redirect, RequestBuilder};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::backoff::FetchFailure;
use crate::config::{HttpConfig, SpotifyConfig};
use crate::credential::{CachedToken, Credential};
use crate::errors::HarvestError;
use crate::types::{
    PlaylistItem, SourceTag, SpotifyFeatureRecord, SpotifyTrackRecord, TrackBatch
};

/// Refresh tokens this long before Spotify says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const PLAYLIST_FIELDS: &str =
    "name,tracks(next,items(added_at,track(name,id,duration_ms,artists(name))))";

/// One upstream catalog as the harvester sees it
#[async_trait]
pub trait CatalogClient: Send + Sync + 'static {
    type Item: std::fmt::Display + Send + Sync + 'static;
    type Record: Send + 'static;

    fn source(&self) -> SourceTag;

    async fn fetch_batch(
        &self,
        item: &Self::Item,
        credential: &Credential
    ) -> Result<Vec<Self::Record>, FetchFailure>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, HarvestError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| HarvestError::Http(format!("build client: {e}")))
}

fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers.get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Sends and decodes, turning any non-2xx into a classified-later failure
async fn send_json(request: RequestBuilder) -> Result<Value, FetchFailure> {
    let resp = request.send().await?;
    let status = resp.status();
    if status.is_success() {
        return resp.json::<Value>().await
            .map_err(|e| FetchFailure::transport(format!("decode body: {e}")));
    }
    let wait = retry_after(resp.headers());
    let body = resp.text().await.unwrap_or_default();
    Err(FetchFailure::status(status.as_u16(), body).with_retry_after(wait))
}

#[derive(Debug)]
pub struct SpotifyClient {
    http: Client,
    cfg: SpotifyConfig
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) -> Result<Self, HarvestError> {
        let http = base_client(http_config)?;
        Ok( Self { http, cfg: cfg.clone() })
    }

    pub fn token_request(&self, credential: &Credential) -> RequestBuilder {
        self.http
            .post(self.cfg.token_url.clone())
            .basic_auth(credential.client_id(), Some(credential.client_secret()))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
    }

    /// Client-credentials bearer for this identity, cached until near expiry.
    /// A refresh only holds this identity's slot.
    pub async fn bearer(&self, credential: &Credential) -> Result<String, FetchFailure> {
        let mut slot = credential.token_slot().lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.bearer.clone());
        }

        let value = send_json(self.token_request(credential)).await?;
        let bearer = value["access_token"].as_str()
            .ok_or_else(|| FetchFailure::transport("token response without access_token"))?
            .to_string();
        let lifetime = Duration::from_secs(value["expires_in"].as_u64().unwrap_or(3600));
        let expires_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN);

        debug!(credential = credential.label(), "spotify.token.refreshed");
        *slot = Some(CachedToken { bearer: bearer.clone(), expires_at });
        Ok(bearer)
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchFailure> {
        self.cfg.api_base.join(path)
            .map_err(|e| FetchFailure::transport(format!("bad endpoint {path}: {e}")))
    }

    /// GET /v1/browse/categories
    pub async fn categories(&self, credential: &Credential) ->
        Result<Vec<(String, String)>, FetchFailure> {
        let bearer = self.bearer(credential).await?;
        let url = self.endpoint("browse/categories")?;
        let limit = self.cfg.category_limit.to_string();
        let value = send_json(self.http.get(url).bearer_auth(bearer).query(&[
            ("country", self.cfg.market.as_str()),
            ("locale", self.cfg.locale.as_str()),
            ("limit", limit.as_str()),
            ("offset", "0")
        ])).await?;
        Ok(parse_categories(&value))
    }

    /// GET /v1/browse/categories/{id}/playlists
    pub async fn category_playlists(&self, credential: &Credential, category_id: &str) ->
        Result<Vec<String>, FetchFailure> {
        let bearer = self.bearer(credential).await?;
        let url = self.endpoint(&format!("browse/categories/{category_id}/playlists"))?;
        let limit = self.cfg.playlist_limit.to_string();
        let value = send_json(self.http.get(url).bearer_auth(bearer).query(&[
            ("country", self.cfg.market.as_str()),
            ("limit", limit.as_str()),
            ("offset", "0")
        ])).await?;
        Ok(parse_playlist_ids(&value))
    }

    /// GET /v1/playlists/{id}, then tracks.next up to the page limit
    pub async fn playlist_tracks(&self, credential: &Credential, item: &PlaylistItem) ->
        Result<Vec<SpotifyTrackRecord>, FetchFailure> {
        let bearer = self.bearer(credential).await?;
        let url = self.endpoint(&format!("playlists/{}", item.playlist_id))?;
        let value = send_json(self.http.get(url).bearer_auth(&bearer).query(&[
            ("market", self.cfg.market.as_str()),
            ("fields", PLAYLIST_FIELDS)
        ])).await?;

        let playlist_name = value["name"].as_str().map(str::to_string);
        let mut records = parse_track_items(&value["tracks"], item, playlist_name.as_deref());

        let mut next = value["tracks"]["next"].as_str().map(str::to_string);
        let mut pages = 1;
        while let Some(link) = next.take() {
            if pages >= self.cfg.playlist_max_pages {
                break;
            }
            let page = send_json(self.http.get(&link).bearer_auth(&bearer)).await?;
            records.extend(parse_track_items(&page, item, playlist_name.as_deref()));
            next = page["next"].as_str().map(str::to_string);
            pages += 1;
        }
        Ok(records)
    }

    /// GET /v1/audio-features?ids=...
    pub async fn audio_features(&self, credential: &Credential, batch: &TrackBatch) ->
        Result<Vec<SpotifyFeatureRecord>, FetchFailure> {
        let bearer = self.bearer(credential).await?;
        let url = self.endpoint("audio-features")?;
        let value = send_json(
            self.http.get(url).bearer_auth(bearer).query(&[("ids", batch.ids_csv())])
        ).await?;
        Ok(parse_audio_features(&value))
    }
}

fn parse_categories(value: &Value) -> Vec<(String, String)> {
    value["categories"]["items"].as_array()
        .map(|items| items.iter()
            .filter_map(|c| {
                let id = c["id"].as_str()?;
                let name = c["name"].as_str().unwrap_or(id);
                Some((id.to_string(), name.to_string()))
            })
            .collect())
        .unwrap_or_default()
}

fn parse_playlist_ids(value: &Value) -> Vec<String> {
    value["playlists"]["items"].as_array()
        .map(|items| items.iter()
            .filter_map(|p| p["id"].as_str())
            .map(str::to_string)
            .collect())
        .unwrap_or_default()
}

/// One record per non-null track on a playlist page
fn parse_track_items(
    page: &Value,
    item: &PlaylistItem,
    playlist_name: Option<&str>
) -> Vec<SpotifyTrackRecord> {
    let Some(entries) = page["items"].as_array() else {
        return Vec::new();
    };
    entries.iter()
        .filter_map(|entry| {
            let track = entry.get("track").filter(|t| !t.is_null())?;
            let id = track["id"].as_str().filter(|id| !id.is_empty())?;
            let name = track["name"].as_str()?;
            Some(SpotifyTrackRecord {
                id: id.to_string(),
                track: name.to_string(),
                artists: track["artists"].as_array()
                    .map(|a| a.iter()
                        .filter_map(|artist| artist["name"].as_str())
                        .map(str::to_string)
                        .collect())
                    .unwrap_or_default(),
                category: item.category.clone(),
                playlist_id: item.playlist_id.clone(),
                playlist_name: playlist_name.map(str::to_string),
                date_added: entry["added_at"].as_str().map(str::to_string),
                track_url: format!("https://open.spotify.com/track/{id}"),
                duration_ms: track["duration_ms"].as_u64()
            })
        })
        .collect()
}

/// Null entries are unknown ids; malformed ones are skipped individually
fn parse_audio_features(value: &Value) -> Vec<SpotifyFeatureRecord> {
    let Some(entries) = value["audio_features"].as_array() else {
        return Vec::new();
    };
    entries.iter()
        .filter(|e| !e.is_null())
        .filter_map(|e| match serde_json::from_value::<SpotifyFeatureRecord>(e.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = %err, "fetch.features.malformed");
                None
            }
        })
        .collect()
}

/// Playlist work items against the shared Spotify client
#[derive(Debug, Clone)]
pub struct PlaylistTracks(pub Arc<SpotifyClient>);

#[async_trait]
impl CatalogClient for PlaylistTracks {
    type Item = PlaylistItem;
    type Record = SpotifyTrackRecord;

    fn source(&self) -> SourceTag { SourceTag::Spotify }

    async fn fetch_batch(&self, item: &PlaylistItem, credential: &Credential) ->
        Result<Vec<SpotifyTrackRecord>, FetchFailure> {
        self.0.playlist_tracks(credential, item).await
    }
}

/// Track-id batches against the shared Spotify client
#[derive(Debug, Clone)]
pub struct AudioFeatures(pub Arc<SpotifyClient>);

#[async_trait]
impl CatalogClient for AudioFeatures {
    type Item = TrackBatch;
    type Record = SpotifyFeatureRecord;

    fn source(&self) -> SourceTag { SourceTag::Spotify }

    async fn fetch_batch(&self, item: &TrackBatch, credential: &Credential) ->
        Result<Vec<SpotifyFeatureRecord>, FetchFailure> {
        self.0.audio_features(credential, item).await
    }
}
