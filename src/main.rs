//!
//! src/main.rs  Andrew Belles  Oct 8th, 2025
//!
//! Wires configuration, logging and the credential pool, then runs one
//! full harvest: discovery, playlist pass, features pass, normalization,
//! reconciliation and persistence. Live testbenches sit at the bottom.
//!
//!

mod config;
mod errors;
mod logging;

mod types;
mod fetch;
mod backoff;
mod credential;
mod partition;
mod accumulator;
mod harvester;
mod discover;
mod normalize;
mod reconcile;
mod sink;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::config::AppConfig;
use crate::credential::CredentialPool;
use crate::errors::HarvestError;
use crate::harvester::Harvester;
use crate::reconcile::Reconciler;
use crate::sink::{DiskZstdSink, EntitySink, RawKind};
use crate::types::{SourceRecordSet, SourceTag, TrackBatch};

#[tokio::main]
async fn main() -> Result<(), HarvestError> {
    let cfgs = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    info!(
        service = "rs-harvester",
        version = %env!("CARGO_PKG_VERSION"),
        credentials = cfgs.credentials.pairs.len(),
        "starting"
    );

    let run_date = Utc::now().date_naive();
    match run(&cfgs, run_date).await {
        Ok(summary) => {
            info!(
                %run_date, entities = summary.entities,
                retry_exceeded = summary.retry_exceeded,
                playlist_exhausted = %summary.playlist_exhausted,
                features_exhausted = %summary.features_exhausted,
                "run.done"
            );
            Ok(())
        }
        Err(e) => {
            error!(%run_date, error = %e, "run.failed");
            Err(e)
        }
    }
}

/// What a finished run reports; exhausted counts are `label=count` per shard
#[derive(Debug, Clone, PartialEq, Eq)]
struct RunSummary {
    entities: usize,
    retry_exceeded: bool,
    playlist_exhausted: String,
    features_exhausted: String
}

/// One end-to-end harvest for `run_date`
async fn run(cfgs: &AppConfig, run_date: NaiveDate) -> Result<RunSummary, HarvestError> {
    let pool = CredentialPool::from_config(&cfgs.credentials, cfgs.harvest.credential_min_interval);
    if pool.is_empty() {
        return Err(HarvestError::Config("no spotify credentials".into()));
    }
    let youtube_filter = normalize::YoutubeFilter::standard()?;
    let spotify = Arc::new(fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?);
    let policy = BackoffPolicy::new(cfgs.harvest.cooldowns.clone(), cfgs.harvest.retry_budget);
    let sink = DiskZstdSink::new(&cfgs.persistence.output_root, cfgs.persistence.zstd_level);

    let playlists = discover::discover_playlists(
        spotify.as_ref(), &pool, cfgs.harvest.discovery_interval
    ).await;

    let playlist_pass = Harvester::new(
        Arc::new(fetch::PlaylistTracks(spotify.clone())),
        policy.clone(),
        cfgs.harvest.playlist_quiescence
    ).run_pass(&pool, playlists).await;
    playlist_pass.outcome()?;
    let mut retry_exceeded = playlist_pass.retry_exceeded;
    let playlist_exhausted = playlist_pass.exhausted_by_shard();
    let tracks = playlist_pass.into_records();
    sink.write_raw(RawKind::PlaylistTrack, &tracks, run_date)?;

    if !cfgs.harvest.pass_gap.is_zero() {
        info!(gap_secs = cfgs.harvest.pass_gap.as_secs(), "run.pass_gap");
        tokio::time::sleep(cfgs.harvest.pass_gap).await;
    }

    let batches = TrackBatch::chunk(
        tracks.records.iter().map(|t| t.id.as_str()),
        cfgs.harvest.feature_batch_size
    );
    let features_pass = Harvester::new(
        Arc::new(fetch::AudioFeatures(spotify.clone())),
        policy,
        cfgs.harvest.features_quiescence
    ).run_pass(&pool, batches).await;
    if let Err(e) = features_pass.outcome() {
        // tracks still reconcile without features
        warn!(pass_id = %features_pass.pass_id, error = %e, "run.features.empty");
    }
    retry_exceeded |= features_pass.retry_exceeded;
    let features_exhausted = features_pass.exhausted_by_shard();
    let features = features_pass.into_records();
    sink.write_raw(RawKind::AudioFeatures, &features, run_date)?;

    let videos = match &cfgs.persistence.youtube_records {
        Some(path) => normalize::parse_youtube_values(sink::load_youtube_values(path)?),
        None => {
            warn!("run.youtube.not_configured");
            SourceRecordSet::new(SourceTag::Ytmusic)
        }
    };
    if !videos.is_empty() {
        sink.write_raw(RawKind::VideoRecord, &videos, run_date)?;
    }

    let mut rows = normalize::spotify_rows(&tracks, &features);
    rows.extend(normalize::youtube_rows(&videos, &youtube_filter));

    let fetch_date = run_date.and_time(chrono::NaiveTime::default());
    let entities = Reconciler::default().run(rows, fetch_date);
    sink.persist(&entities, run_date)?;

    Ok( RunSummary {
        entities: entities.len(),
        retry_exceeded,
        playlist_exhausted,
        features_exhausted
    })
}

/// Unit Tests
/// Live Spotify testbenches
#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::types::PlaylistItem;

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    fn first_credential(cfgs: &AppConfig) -> Result<Credential, HarvestError> {
        let pair = cfgs.credentials.pairs.first()
            .ok_or_else(|| HarvestError::Config("no spotify credentials".into()))?;
        Ok(Credential::new("client-1", pair, std::time::Duration::ZERO))
    }

    #[tokio::test]
    async fn spotify_browse_testbench() -> Result<(), HarvestError> {
        dotenvy::dotenv().ok();
        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = config::load_config()?;
        let spotify = fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
        let credential = first_credential(&cfgs)?;

        let categories = spotify.categories(&credential).await
            .map_err(|f| HarvestError::Http(f.message))?;
        assert!(!categories.is_empty());
        println!("categories: {categories:?}");

        let (id, _) = &categories[0];
        let playlists = spotify.category_playlists(&credential, id).await
            .map_err(|f| HarvestError::Http(f.message))?;
        println!("playlists in {id}: {playlists:?}");

        Ok(())
    }

    #[tokio::test]
    async fn spotify_playlist_and_features_testbench() -> Result<(), HarvestError> {
        dotenvy::dotenv().ok();
        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = config::load_config()?;
        let spotify = fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
        let credential = first_credential(&cfgs)?;

        // Today's Top Hits
        let item = PlaylistItem { playlist_id: "37i9dQZF1DXcBWIGoYBM5M".into(), category: None };
        let tracks = spotify.playlist_tracks(&credential, &item).await
            .map_err(|f| HarvestError::Http(f.message))?;
        assert!(!tracks.is_empty());
        println!("first track: {:?}", tracks[0]);

        let batch = TrackBatch::chunk(tracks.iter().map(|t| t.id.as_str()), 5);
        let features = spotify.audio_features(&credential, &batch[0]).await
            .map_err(|f| HarvestError::Http(f.message))?;
        println!("features: {}", serde_json::to_string_pretty(&features)?);

        Ok(())
    }
}
