//!
//! src/reconcile.rs  Andrew Belles  Oct 7th, 2025
//!
//! Joins normalized rows from every source on their native id, resolves
//! each field by its declared rule, then collapses rows naming the same
//! (song, artist) into one canonical entity
//!
//! Scalar fields coalesce in a fixed per-field source order, multi-valued
//! fields union, durations are normalized to seconds and the longest wins.
//! Output is sorted by (song, artist) and every set is ordered, so the same
//! input always serializes to the same bytes whatever order it came in.
//!

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::errors::HarvestError;
use crate::types::{
    ArtistCredit, AudioFeatures, CanonicalEntity, RawRecord, SourceTag
};

/// Source order for each coalesced field
#[derive(Debug, Clone)]
pub struct FieldPriority {
    pub song: Vec<SourceTag>,
    pub artist: Vec<SourceTag>,
    pub publish_date: Vec<SourceTag>,
    pub language: Vec<SourceTag>,
    pub view_count: Vec<SourceTag>,
    pub features: Vec<SourceTag>
}

impl Default for FieldPriority {
    fn default() -> Self {
        use SourceTag::{Spotify, Ytmusic};
        Self {
            song: vec![Spotify, Ytmusic],
            artist: vec![Spotify, Ytmusic],
            publish_date: vec![Spotify, Ytmusic],
            language: vec![Ytmusic, Spotify],
            view_count: vec![Ytmusic, Spotify],
            features: vec![Spotify]
        }
    }
}

/// First non-null value, walking sources in `priority` order. Sources
/// missing from the list are never consulted.
pub fn coalesce<'a, T>(
    priority: &[SourceTag],
    rows: &[&'a RawRecord],
    get: impl Fn(&'a RawRecord) -> Option<T>
) -> Option<T> {
    priority.iter()
        .flat_map(|source| rows.iter().filter(move |r| r.source == *source))
        .find_map(|r| get(*r))
}

/// Flattens every contribution into one set, discarding empties
pub fn union<'a, I>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>
{
    values.into_iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Longest reported duration in seconds, ignoring unusable values
fn longest_seconds<'a, I>(rows: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a RawRecord>
{
    rows.into_iter()
        .filter_map(|r| r.duration)
        .filter(|d| d.is_valid())
        .map(|d| d.as_seconds())
        .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))
}

/// A coalesced value and the source it was taken from
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub source: SourceTag,
    pub value: T
}

impl<T> Sourced<T> {
    fn from_row(row: &RawRecord, value: Option<T>) -> Option<Self> {
        value.map(|value| Sourced { source: row.source, value })
    }
}

/// Highest-priority source among already-resolved rows; rows of one source
/// are taken in the order given
fn coalesce_sourced<T: Clone>(
    priority: &[SourceTag],
    rows: &[ReconciledRow],
    get: impl Fn(&ReconciledRow) -> Option<&Sourced<T>>
) -> Option<T> {
    priority.iter().find_map(|source| {
        rows.iter()
            .filter_map(&get)
            .find(|s| s.source == *source)
            .map(|s| s.value.clone())
    })
}

/// One row per native id after the outer join, fields already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRow {
    pub ids: BTreeSet<String>,
    pub song: Option<String>,
    pub artist: Vec<String>,
    pub category: BTreeSet<String>,
    pub playlist: BTreeSet<String>,
    pub playlist_description: BTreeSet<String>,
    pub url: BTreeSet<String>,
    pub platform: BTreeSet<String>,
    pub song_duration: Option<f64>,
    pub publish_date: Option<Sourced<String>>,
    pub language: Option<Sourced<String>>,
    pub view_count: Option<Sourced<u64>>,
    pub features: Option<Sourced<AudioFeatures>>
}

impl ReconciledRow {
    fn joined_id(&self) -> String {
        self.ids.iter().map(String::as_str).collect::<Vec<_>>().join("_")
    }
}

fn validate(row: &RawRecord) -> Result<(), HarvestError> {
    if row.native_id.trim().is_empty() {
        return Err(HarvestError::ReconciliationType("empty native id".to_string()));
    }
    if let Some(d) = row.duration {
        if !d.is_valid() {
            return Err(HarvestError::ReconciliationType(
                format!("unusable duration {d:?}")
            ));
        }
    }
    if let Some(f) = &row.features {
        if !f.all_finite() {
            return Err(HarvestError::ReconciliationType("non-finite audio feature".to_string()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    priority: FieldPriority
}

impl Reconciler {
    /// Full pass: join on native id, then collapse on (song, artist)
    pub fn run(&self, rows: Vec<RawRecord>, fetch_date: NaiveDateTime) -> Vec<CanonicalEntity> {
        let input = rows.len();
        let joined = self.join(rows);
        let joined_count = joined.len();
        let entities = Deduplicator { priority: self.priority.clone() }
            .collapse(joined, fetch_date);
        info!(rows = input, joined = joined_count, entities = entities.len(), "reconcile.done");
        entities
    }

    /// Outer join across sources on the native id; ids seen on one side only
    /// are carried through on their own
    pub fn join(&self, rows: Vec<RawRecord>) -> Vec<ReconciledRow> {
        let mut by_id: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
        for row in rows {
            if let Err(error) = validate(&row) {
                warn!(source = %row.source, native_id = %row.native_id, error = %error,
                    "reconcile.row.dropped");
                continue;
            }
            by_id.entry(row.native_id.trim().to_string()).or_default().push(row);
        }

        by_id.into_iter()
            .map(|(id, mut group)| {
                // same-source duplicates resolve the same way in any input order
                group.sort_by(|a, b| {
                    (a.source, &a.song, &a.publish_date, a.url.iter().next(), &a.artist)
                        .cmp(&(b.source, &b.song, &b.publish_date, b.url.iter().next(), &b.artist))
                });
                let refs: Vec<&RawRecord> = group.iter().collect();
                self.resolve(id, &refs)
            })
            .collect()
    }

    fn resolve(&self, id: String, rows: &[&RawRecord]) -> ReconciledRow {
        let p = &self.priority;
        ReconciledRow {
            ids: BTreeSet::from([id]),
            song: coalesce(&p.song, rows, |r| r.song.clone()),
            artist: coalesce(&p.artist, rows, |r| {
                if r.artist.is_empty() { None } else { Some(r.artist.clone()) }
            }).unwrap_or_default(),
            category: union(rows.iter().flat_map(|r| r.category.iter())),
            playlist: union(rows.iter().flat_map(|r| r.playlist.iter())),
            playlist_description: union(rows.iter().flat_map(|r| r.playlist_description.iter())),
            url: union(rows.iter().flat_map(|r| r.url.iter())),
            platform: rows.iter().map(|r| r.source.platform().to_string()).collect(),
            song_duration: longest_seconds(rows.iter().copied()),
            publish_date: coalesce(&p.publish_date, rows,
                |r| Sourced::from_row(r, r.publish_date.clone())),
            language: coalesce(&p.language, rows, |r| Sourced::from_row(r, r.language.clone())),
            view_count: coalesce(&p.view_count, rows, |r| Sourced::from_row(r, r.view_count)),
            features: coalesce(&p.features, rows, |r| Sourced::from_row(r, r.features.clone()))
        }
    }
}

/// Second grouping on (song, artist) for rows whose native ids diverged;
/// scalars are coalesced again under the same per-field priority
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    priority: FieldPriority
}

impl Deduplicator {
    pub fn collapse(&self, rows: Vec<ReconciledRow>, fetch_date: NaiveDateTime) ->
        Vec<CanonicalEntity> {
        let mut groups: BTreeMap<(String, Vec<String>), Vec<ReconciledRow>> = BTreeMap::new();
        for row in rows {
            let Some(song) = row.song.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
                let error = HarvestError::ReconciliationType("no song title".to_string());
                warn!(id = %row.joined_id(), error = %error, "reconcile.row.dropped");
                continue;
            };
            let artist: Vec<String> = row.artist.iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            groups.entry((song.to_string(), artist)).or_default().push(row);
        }

        groups.into_iter()
            .map(|((song, artist), mut group)| {
                group.sort_by_key(ReconciledRow::joined_id);
                if group.len() > 1 {
                    debug!(song = %song, merged = group.len(), "reconcile.dedup.merged");
                }
                self.aggregate(song, artist, &group, fetch_date)
            })
            .collect()
    }

    fn aggregate(
        &self,
        song: String,
        artist: Vec<String>,
        group: &[ReconciledRow],
        fetch_date: NaiveDateTime
    ) -> CanonicalEntity {
        let p = &self.priority;
        CanonicalEntity {
            id: group.iter().flat_map(|r| r.ids.iter().cloned()).collect(),
            song,
            artist: ArtistCredit::from_names(artist),
            category: union(group.iter().flat_map(|r| r.category.iter())),
            playlist: union(group.iter().flat_map(|r| r.playlist.iter())),
            playlist_description: union(group.iter().flat_map(|r| r.playlist_description.iter())),
            url: union(group.iter().flat_map(|r| r.url.iter())),
            language: coalesce_sourced(&p.language, group, |r| r.language.as_ref()),
            publish_date: coalesce_sourced(&p.publish_date, group, |r| r.publish_date.as_ref()),
            platform: union(group.iter().flat_map(|r| r.platform.iter())),
            song_duration: group.iter()
                .filter_map(|r| r.song_duration)
                .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s)))),
            view_count: coalesce_sourced(&p.view_count, group, |r| r.view_count.as_ref()),
            fetch_date,
            features: coalesce_sourced(&p.features, group, |r| r.features.as_ref())
                .unwrap_or_default()
        }
    }
}
