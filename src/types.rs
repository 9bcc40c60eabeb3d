//!
//! src/types.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Work items, per-source records, the common row shape the reconciler
//! consumes and the canonical entity it produces
//!

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};

/// Source identifier used to resolve field priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Spotify,
    Ytmusic
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Spotify => "spotify",
            SourceTag::Ytmusic => "ytmusic"
        }
    }

    /// Value written to the canonical `platform` set
    pub fn platform(self) -> &'static str {
        match self {
            SourceTag::Spotify => "spotify",
            SourceTag::Ytmusic => "youtube_music"
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// Work items
///

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub playlist_id: String,
    pub category: Option<String>
}

impl fmt::Display for PlaylistItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playlist:{}", self.playlist_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackBatch(pub Vec<String>);

impl TrackBatch {
    /// Distinct, sorted ids chunked into batches of `size`
    pub fn chunk<I, S>(ids: I, size: usize) -> Vec<TrackBatch>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        let distinct: BTreeSet<String> = ids.into_iter()
            .map(Into::into)
            .filter(|id: &String| !id.trim().is_empty())
            .collect();
        let distinct: Vec<String> = distinct.into_iter().collect();
        distinct.chunks(size.max(1))
            .map(|chunk| TrackBatch(chunk.to_vec()))
            .collect()
    }

    pub fn ids_csv(&self) -> String {
        self.0.join(",")
    }
}

impl fmt::Display for TrackBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.first() {
            Some(first) => write!(f, "batch:{first}+{}", self.0.len() - 1),
            None => f.write_str("batch:empty")
        }
    }
}

///
/// Typed per-source records, as produced by one successful fetch
///

/// One track as it appeared in one playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyTrackRecord {
    pub id: String,
    pub track: String,
    pub artists: Vec<String>,
    pub category: Option<String>,
    pub playlist_id: String,
    pub playlist_name: Option<String>,
    pub date_added: Option<String>,
    pub track_url: String,
    pub duration_ms: Option<u64>
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub key: Option<i32>,
    pub loudness: Option<f64>,
    pub mode: Option<i32>,
    pub speechiness: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub time_signature: Option<i32>
}

impl AudioFeatures {
    pub fn is_empty(&self) -> bool {
        *self == AudioFeatures::default()
    }

    pub fn all_finite(&self) -> bool {
        [
            self.danceability, self.energy, self.loudness, self.speechiness,
            self.acousticness, self.instrumentalness, self.liveness,
            self.valence, self.tempo
        ].iter().flatten().all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyFeatureRecord {
    pub id: String,
    pub duration_ms: Option<u64>,
    #[serde(flatten)]
    pub features: AudioFeatures
}

///
/// Common row shape every source is normalized into before reconciliation
///

/// Durations arrive in different units per source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceDuration {
    Millis(f64),
    Seconds(f64)
}

impl SourceDuration {
    pub fn as_seconds(self) -> f64 {
        match self {
            SourceDuration::Millis(ms) => ms / 1000.0,
            SourceDuration::Seconds(s) => s
        }
    }

    pub fn is_valid(self) -> bool {
        let s = self.as_seconds();
        s.is_finite() && s >= 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: SourceTag,
    pub native_id: String,
    pub song: Option<String>,
    pub artist: Vec<String>,
    pub category: BTreeSet<String>,
    pub playlist: BTreeSet<String>,
    pub playlist_description: BTreeSet<String>,
    pub url: BTreeSet<String>,
    pub publish_date: Option<String>,
    pub language: Option<String>,
    pub duration: Option<SourceDuration>,
    pub view_count: Option<u64>,
    pub features: Option<AudioFeatures>
}

impl RawRecord {
    pub fn new(source: SourceTag, native_id: impl Into<String>) -> Self {
        Self {
            source,
            native_id: native_id.into(),
            song: None,
            artist: Vec::new(),
            category: BTreeSet::new(),
            playlist: BTreeSet::new(),
            playlist_description: BTreeSet::new(),
            url: BTreeSet::new(),
            publish_date: None,
            language: None,
            duration: None,
            view_count: None,
            features: None
        }
    }
}

/// Records from one source for one pass; order carries no meaning
#[derive(Debug, Clone)]
pub struct SourceRecordSet<R> {
    pub source: SourceTag,
    pub records: Vec<R>
}

impl<R> SourceRecordSet<R> {
    pub fn new(source: SourceTag) -> Self {
        Self { source, records: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

///
/// Reconciled output
///

/// Artist stays scalar when only one name survives grouping
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtistCredit {
    Single(String),
    Multiple(Vec<String>)
}

impl ArtistCredit {
    pub fn from_names(mut names: Vec<String>) -> Option<Self> {
        names.retain(|n| !n.trim().is_empty());
        match names.len() {
            0 => None,
            1 => names.pop().map(|n| ArtistCredit::Single(n.trim().to_string())),
            _ => Some(ArtistCredit::Multiple(names))
        }
    }
}

fn join_ids<S: Serializer>(ids: &BTreeSet<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ids.iter().map(String::as_str).collect::<Vec<_>>().join("_"))
}

fn fetch_date_format<S: Serializer>(date: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&date.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// One row per distinct (song, artist); serializes as one flat tabular row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEntity {
    #[serde(serialize_with = "join_ids")]
    pub id: BTreeSet<String>,
    pub song: String,
    pub artist: Option<ArtistCredit>,
    pub category: BTreeSet<String>,
    pub playlist: BTreeSet<String>,
    pub playlist_description: BTreeSet<String>,
    pub url: BTreeSet<String>,
    pub language: Option<String>,
    pub publish_date: Option<String>,
    pub platform: BTreeSet<String>,
    pub song_duration: Option<f64>,
    pub view_count: Option<u64>,
    #[serde(serialize_with = "fetch_date_format")]
    pub fetch_date: NaiveDateTime,
    #[serde(flatten)]
    pub features: AudioFeatures
}

#[cfg(test)]
impl CanonicalEntity {
    /// Sorted, deduplicated, underscore-joined native ids
    pub fn joined_id(&self) -> String {
        self.id.iter().map(String::as_str).collect::<Vec<_>>().join("_")
    }
}
