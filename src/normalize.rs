//!
//! src/normalize.rs  Andrew Belles  Oct 6th, 2025
//!
//! Maps each source's typed records into the common RawRecord row, one
//! row per (source, native id). Rows that cannot be normalized are
//! dropped here with a log line instead of failing the pass.
//!
//! Video rows also pass a cleaning stage: regional categories and playlists
//! are filtered out, emoji are stripped from text, publish dates lose their
//! time part and the language is detected from lyrics or the title.
//!

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::HarvestError;
use crate::types::{
    RawRecord, SourceDuration, SourceRecordSet, SourceTag, SpotifyFeatureRecord,
    SpotifyTrackRecord
};

/// A text field the video exporter writes as a scalar, a `{a,b}` literal
/// or a json array depending on where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextList {
    One(String),
    Many(Vec<Option<String>>)
}

impl TextList {
    pub fn items(&self) -> Vec<String> {
        match self {
            TextList::One(s) => {
                let trimmed = s.trim();
                if trimmed.starts_with('{') && trimmed.ends_with('}') {
                    trimmed.trim_matches(|c| c == '{' || c == '}')
                        .split(',')
                        .filter_map(clean)
                        .collect()
                } else {
                    clean(trimmed).into_iter().collect()
                }
            }
            TextList::Many(values) => values.iter().flatten().filter_map(|v| clean(v)).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeRecord {
    pub song_video_id: String,
    pub song_title_short: Option<String>,
    pub author: Option<TextList>,
    pub song_duration_sec: Option<f64>,
    pub publish_date: Option<String>,
    pub category_title: Option<TextList>,
    pub playlist_title: Option<TextList>,
    pub playlist_description: Option<TextList>,
    #[serde(rename = "songURL")]
    pub song_url: Option<String>,
    pub language: Option<String>,
    pub view_count: Option<u64>,
    pub lyrics: Option<String>
}

/// Trims quotes and whitespace; empty means absent
fn clean(s: &str) -> Option<String> {
    let t = s.trim().trim_matches('"').trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

fn clean_opt(s: Option<&str>) -> Option<String> {
    s.and_then(clean)
}

fn dropped(source: SourceTag, native_id: &str, reason: &str) {
    let error = HarvestError::ReconciliationType(reason.to_string());
    warn!(%source, native_id, error = %error, "normalize.row.dropped");
}

/// Appends each list in turn, keeping credit order and the first sighting
/// of a repeated name. Lists are visited sorted so input order never matters.
fn ordered_credits(mut lists: Vec<Vec<String>>) -> Vec<String> {
    lists.sort();
    let mut seen = BTreeSet::new();
    lists.into_iter()
        .flatten()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

pub fn spotify_category(label: &str) -> String {
    match label {
        "Soul" | "R&B" => "R&B & Soul".to_string(),
        other => other.to_string()
    }
}

pub fn youtube_category(label: &str) -> String {
    match label {
        "Taiwan Music" | "Hong Kong Music" => "Mandopop",
        "Feel Good" | "Sad" => "Mood",
        "Romance" => "Love",
        "Country & Americana" => "Country",
        "Dance & Electronic" => "Dance/Electronic",
        "J-Pop" => "J-Tracks",
        other => other
    }.to_string()
}

/// Groups playlist appearances by track id and left-joins audio features
pub fn spotify_rows(
    tracks: &SourceRecordSet<SpotifyTrackRecord>,
    features: &SourceRecordSet<SpotifyFeatureRecord>
) -> Vec<RawRecord> {
    let mut by_feature_id: BTreeMap<&str, &SpotifyFeatureRecord> = BTreeMap::new();
    for f in &features.records {
        by_feature_id.entry(f.id.as_str()).or_insert(f);
    }

    let mut by_track_id: BTreeMap<&str, Vec<&SpotifyTrackRecord>> = BTreeMap::new();
    for t in &tracks.records {
        match clean(&t.id) {
            Some(_) => by_track_id.entry(t.id.trim()).or_default().push(t),
            None => dropped(SourceTag::Spotify, &t.id, "empty track id")
        }
    }

    let mut rows = Vec::with_capacity(by_track_id.len());
    for (id, group) in by_track_id {
        let mut row = RawRecord::new(SourceTag::Spotify, id);
        row.song = group.iter().filter_map(|t| clean(&t.track)).min();
        row.artist = ordered_credits(group.iter()
            .filter_map(|t| t.artists.first().and_then(|a| clean(a)))
            .map(|a| vec![a])
            .collect());
        row.category = group.iter()
            .filter_map(|t| clean_opt(t.category.as_deref()))
            .map(|c| spotify_category(&c))
            .collect();
        row.playlist = group.iter()
            .filter_map(|t| clean_opt(t.playlist_name.as_deref()))
            .collect();
        row.url = group.iter().filter_map(|t| clean(&t.track_url)).collect();
        row.publish_date = group.iter()
            .filter_map(|t| clean_opt(t.date_added.as_deref()))
            .min();

        let feature = by_feature_id.get(id).copied();
        let duration_ms = feature.and_then(|f| f.duration_ms)
            .or_else(|| group.iter().filter_map(|t| t.duration_ms).max());
        row.duration = duration_ms.map(|ms| SourceDuration::Millis(ms as f64));

        if let Some(f) = feature {
            if !f.features.all_finite() {
                dropped(SourceTag::Spotify, id, "non-finite audio feature");
                continue;
            }
            if !f.features.is_empty() {
                row.features = Some(f.features.clone());
            }
        }
        rows.push(row);
    }

    debug!(tracks = tracks.len(), features = features.len(), rows = rows.len(),
        "normalize.spotify.done");
    rows
}

/// Language label for a video row; `Other` rows are dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Korean,
    Japanese,
    Chinese,
    English,
    Other,
    Unknown
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::Korean   => "Korean",
            Language::Japanese => "Japanese",
            Language::Chinese  => "Chinese",
            Language::English  => "English",
            Language::Other    => "Other",
            Language::Unknown  => "Unknown"
        })
    }
}

/// Share of ascii letters needed to call a text English, and of anything
/// else to call it Other
pub const LANGUAGE_THRESHOLD: f64 = 0.6;

/// Script checks first, then the ascii letter ratio
pub fn detect_language(text: Option<&str>, threshold: f64) -> Language {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return Language::Unknown;
    };
    let has = |ranges: &[(u32, u32)]| text.chars()
        .any(|c| ranges.iter().any(|&(lo, hi)| (lo..=hi).contains(&(c as u32))));

    if has(&[(0xAC00, 0xD7AF), (0x3130, 0x318F)]) {
        return Language::Korean;
    }
    if has(&[(0x3040, 0x30FF), (0x31F0, 0x31FF), (0x3000, 0x303F)]) {
        return Language::Japanese;
    }
    if has(&[(0x4E00, 0x9FFF)]) {
        return Language::Chinese;
    }

    let total = text.chars().count() as f64;
    let english = text.chars().filter(char::is_ascii_alphabetic).count() as f64;
    if (total - english) / total > threshold {
        Language::Other
    } else if english / total > threshold {
        Language::English
    } else {
        Language::Other
    }
}

pub const DROPPED_YOUTUBE_CATEGORIES: [&str; 3] = ["Bollywood & Indian", "Indonesian", "Thai"];

pub const DROPPED_PLAYLIST_KEYWORDS: [&str; 14] = [
    "Iraqi", "Indonesi", "Bollywood", "Arabic", "Khaleeji", "Araby", "Egyptian",
    "Indian", "Ukrainian", "Turkish", "Russia", "Afro", "Arabesk", "Bhojpuri"
];

/// Emoji and pictograph blocks stripped from video text fields
const EMOJI_PATTERN: &str = concat!(
    "[",
    r"\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{1F1E0}-\x{1F1FF}",
    r"\x{2500}-\x{2BEF}\x{2702}-\x{27B0}\x{1F900}-\x{1F9FF}\x{1F650}-\x{1F67F}",
    r"\x{1F004}-\x{1F0FF}\x{1F191}-\x{1F251}\x{2600}-\x{26FF}\x{2700}-\x{27BF}",
    "]+"
);

/// Cleaning rules for the video catalog export
#[derive(Debug, Clone)]
pub struct YoutubeFilter {
    emoji: Regex,
    playlist_keywords: Option<Regex>,
    dropped_categories: BTreeSet<String>,
    threshold: f64
}

impl YoutubeFilter {
    pub fn new(dropped_categories: &[&str], playlist_keywords: &[&str], threshold: f64) ->
        Result<Self, HarvestError> {
        let emoji = Regex::new(EMOJI_PATTERN)
            .map_err(|e| HarvestError::Config(format!("emoji pattern: {e}")))?;
        let playlist_keywords = if playlist_keywords.is_empty() {
            None
        } else {
            let alternation = playlist_keywords.iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!("(?i){alternation}"))
                .map_err(|e| HarvestError::Config(format!("playlist keywords: {e}")))?)
        };
        Ok( Self {
            emoji,
            playlist_keywords,
            dropped_categories: dropped_categories.iter().map(|c| c.to_string()).collect(),
            threshold
        })
    }

    /// The rules the video export has always been cleaned with
    pub fn standard() -> Result<Self, HarvestError> {
        Self::new(&DROPPED_YOUTUBE_CATEGORIES, &DROPPED_PLAYLIST_KEYWORDS, LANGUAGE_THRESHOLD)
    }

    /// Strips emoji, then trims like every other field
    fn text(&self, s: &str) -> Option<String> {
        clean(&self.emoji.replace_all(s, ""))
    }

    fn text_opt(&self, s: Option<&str>) -> Option<String> {
        s.and_then(|s| self.text(s))
    }

    fn texts(&self, list: Option<&TextList>) -> Vec<String> {
        list.map(TextList::items)
            .unwrap_or_default()
            .iter()
            .filter_map(|s| self.text(s))
            .collect()
    }

    fn drops_category(&self, label: &str) -> bool {
        self.dropped_categories.contains(label)
    }

    fn drops_playlist(&self, title: &str) -> bool {
        self.playlist_keywords.as_ref().is_some_and(|re| re.is_match(title))
    }

    /// Lyrics first, then the title; `Unknown` falls back to the exported label
    fn language(&self, lyrics: Option<&str>, title: Option<&str>) -> Language {
        match detect_language(lyrics, self.threshold) {
            Language::Unknown => detect_language(title, self.threshold),
            found => found
        }
    }
}

/// Drops a `T...` time suffix so only the calendar date is kept
fn date_only(s: &str) -> &str {
    s.split_once('T').map_or(s, |(date, _)| date)
}

/// Row-level decode of the exporter's json; bad rows are dropped alone
pub fn parse_youtube_values(values: Vec<Value>) -> SourceRecordSet<YoutubeRecord> {
    let mut set = SourceRecordSet::new(SourceTag::Ytmusic);
    for (i, value) in values.into_iter().enumerate() {
        let hint = value.get("songVideoId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("row#{i}"));
        match serde_json::from_value::<YoutubeRecord>(value) {
            Ok(record) => set.records.push(record),
            Err(e) => dropped(SourceTag::Ytmusic, &hint, &format!("malformed row: {e}"))
        }
    }
    set
}

/// Groups per-playlist appearances by video id, then applies the cleaning
/// rules to the group as a whole
pub fn youtube_rows(records: &SourceRecordSet<YoutubeRecord>, filter: &YoutubeFilter) ->
    Vec<RawRecord> {
    let mut by_video: BTreeMap<String, Vec<&YoutubeRecord>> = BTreeMap::new();
    for r in &records.records {
        match clean(&r.song_video_id) {
            Some(id) => by_video.entry(id).or_default().push(r),
            None => dropped(SourceTag::Ytmusic, &r.song_video_id, "empty video id")
        }
    }

    let mut rows = Vec::with_capacity(by_video.len());
    'groups: for (id, group) in by_video {
        let labels: Vec<String> = group.iter()
            .flat_map(|r| r.category_title.as_ref().map(TextList::items).unwrap_or_default())
            .collect();
        if let Some(label) = labels.iter().find(|l| filter.drops_category(l)) {
            debug!(native_id = %id, category = %label, "normalize.youtube.filtered");
            continue;
        }
        let playlists: BTreeSet<String> = group.iter()
            .flat_map(|r| filter.texts(r.playlist_title.as_ref()))
            .collect();
        if let Some(title) = playlists.iter().find(|t| filter.drops_playlist(t)) {
            debug!(native_id = %id, playlist = %title, "normalize.youtube.filtered");
            continue;
        }

        let mut row = RawRecord::new(SourceTag::Ytmusic, id.as_str());
        row.song = group.iter().filter_map(|r| filter.text_opt(r.song_title_short.as_deref())).min();
        row.artist = ordered_credits(group.iter()
            .map(|r| filter.texts(r.author.as_ref()))
            .filter(|names| !names.is_empty())
            .collect());
        row.category = labels.iter()
            .filter_map(|l| filter.text(l))
            .map(|c| youtube_category(&c))
            .collect();
        row.playlist = playlists;
        row.playlist_description = group.iter()
            .flat_map(|r| filter.texts(r.playlist_description.as_ref()))
            .collect();
        row.url = group.iter().filter_map(|r| clean_opt(r.song_url.as_deref())).collect();
        row.publish_date = group.iter()
            .filter_map(|r| clean_opt(r.publish_date.as_deref().map(date_only)))
            .min();
        row.view_count = group.iter().filter_map(|r| r.view_count).max();

        let lyrics = group.iter().filter_map(|r| filter.text_opt(r.lyrics.as_deref())).min();
        row.language = match filter.language(lyrics.as_deref(), row.song.as_deref()) {
            Language::Other => {
                dropped(SourceTag::Ytmusic, &id, "language other");
                continue;
            }
            Language::Unknown => group.iter()
                .filter_map(|r| clean_opt(r.language.as_deref()))
                .min(),
            found => Some(found.to_string())
        };

        let mut longest: Option<f64> = None;
        for secs in group.iter().filter_map(|r| r.song_duration_sec) {
            if !SourceDuration::Seconds(secs).is_valid() {
                dropped(SourceTag::Ytmusic, &id, "negative or non-finite duration");
                continue 'groups;
            }
            longest = Some(longest.map_or(secs, |l| l.max(secs)));
        }
        row.duration = longest.map(SourceDuration::Seconds);
        rows.push(row);
    }

    debug!(records = records.len(), rows = rows.len(), "normalize.youtube.done");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFeatures;
    use serde_json::json;

    fn track(id: &str, playlist: &str, category: &str) -> SpotifyTrackRecord {
        SpotifyTrackRecord {
            id: id.into(),
            track: "Song X".into(),
            artists: vec!["Artist Y".into(), "Feat Z".into()],
            category: Some(category.into()),
            playlist_id: format!("{playlist}-id"),
            playlist_name: Some(playlist.into()),
            date_added: Some(format!("2025-09-0{}", playlist.len() % 9)),
            track_url: format!("https://open.spotify.com/track/{id}"),
            duration_ms: Some(199_000)
        }
    }

    #[test]
    fn text_lists_accept_every_exporter_shape() {
        assert_eq!(TextList::One("Artist".into()).items(), vec!["Artist"]);
        assert_eq!(
            TextList::One("{\"A\", B ,\"\"}".into()).items(),
            vec!["A".to_string(), "B".to_string()]
        );
        assert_eq!(
            TextList::Many(vec![Some("A".into()), None, Some(" ".into())]).items(),
            vec!["A".to_string()]
        );
        assert!(TextList::One("  ".into()).items().is_empty());
    }

    #[test]
    fn category_labels_are_mapped_per_source() {
        assert_eq!(spotify_category("Soul"), "R&B & Soul");
        assert_eq!(spotify_category("R&B"), "R&B & Soul");
        assert_eq!(spotify_category("Pop"), "Pop");
        assert_eq!(youtube_category("Hong Kong Music"), "Mandopop");
        assert_eq!(youtube_category("Sad"), "Mood");
        assert_eq!(youtube_category("J-Pop"), "J-Tracks");
        assert_eq!(youtube_category("Jazz"), "Jazz");
    }

    #[test]
    fn spotify_tracks_group_by_id_and_join_features() {
        let mut tracks = SourceRecordSet::new(SourceTag::Spotify);
        tracks.records = vec![
            track("t1", "Hits", "Pop"),
            track("t1", "Chill", "Soul"),
            track("t2", "Hits", "Pop"),
        ];
        let mut features = SourceRecordSet::new(SourceTag::Spotify);
        features.records = vec![SpotifyFeatureRecord {
            id: "t1".into(),
            duration_ms: Some(200_000),
            features: AudioFeatures { tempo: Some(120.0), ..Default::default() }
        }];

        let rows = spotify_rows(&tracks, &features);
        assert_eq!(rows.len(), 2);

        let t1 = &rows[0];
        assert_eq!(t1.native_id, "t1");
        assert_eq!(t1.artist, vec!["Artist Y"]);
        assert_eq!(t1.category.iter().collect::<Vec<_>>(), ["Pop", "R&B & Soul"]);
        assert_eq!(t1.playlist.len(), 2);
        assert_eq!(t1.duration, Some(SourceDuration::Millis(200_000.0)));
        assert_eq!(t1.features.as_ref().and_then(|f| f.tempo), Some(120.0));

        let t2 = &rows[1];
        assert_eq!(t2.duration, Some(SourceDuration::Millis(199_000.0)));
        assert!(t2.features.is_none());
    }

    #[test]
    fn spotify_normalization_ignores_input_order() {
        let mut a = SourceRecordSet::new(SourceTag::Spotify);
        a.records = vec![track("t1", "Hits", "Pop"), track("t1", "Chill", "Soul")];
        let mut b = a.clone();
        b.records.reverse();
        let none = SourceRecordSet::new(SourceTag::Spotify);
        assert_eq!(spotify_rows(&a, &none), spotify_rows(&b, &none));
    }

    #[test]
    fn youtube_rows_drop_malformed_and_negative() {
        let values = vec![
            json!({ "songVideoId": "v1", "songTitleShort": "Song X", "author": "Artist Y",
                    "songDurationSec": 150, "categoryTitle": "{Feel Good,Romance}",
                    "playlistTitle": ["Mix"], "songURL": "https://music.youtube.com/watch?v=v1",
                    "language": "English", "viewCount": 10 }),
            json!({ "songVideoId": "v1", "songTitleShort": "Song X", "author": "Artist Y",
                    "songDurationSec": 151, "categoryTitle": "Sad",
                    "playlistTitle": "Other Mix", "viewCount": 12 }),
            json!({ "songVideoId": "v2", "songTitleShort": "Neg", "songDurationSec": -3 }),
            json!({ "songVideoId": "v3", "author": { "name": "nested" } }),
            json!({ "songTitleShort": "no id" }),
        ];
        let set = parse_youtube_values(values);
        assert_eq!(set.len(), 3);

        let rows = youtube_rows(&set, &YoutubeFilter::standard().unwrap());
        assert_eq!(rows.len(), 1);
        let v1 = &rows[0];
        assert_eq!(v1.native_id, "v1");
        assert_eq!(v1.artist, vec!["Artist Y"]);
        assert_eq!(v1.category.iter().collect::<Vec<_>>(), ["Love", "Mood"]);
        assert_eq!(v1.playlist.iter().collect::<Vec<_>>(), ["Mix", "Other Mix"]);
        assert_eq!(v1.duration, Some(SourceDuration::Seconds(151.0)));
        assert_eq!(v1.view_count, Some(12));
        assert_eq!(v1.language.as_deref(), Some("English"));
    }

    fn video(id: &str, extra: Value) -> Value {
        let mut v = json!({ "songVideoId": id, "songTitleShort": "Song X", "author": "Artist Y" });
        if let (Some(base), Value::Object(more)) = (v.as_object_mut(), extra) {
            base.extend(more);
        }
        v
    }

    #[test]
    fn regional_categories_and_playlists_drop_the_whole_video() {
        let set = parse_youtube_values(vec![
            video("v1", json!({ "categoryTitle": "Pop", "playlistTitle": "Hits" })),
            video("v2", json!({ "categoryTitle": "Pop" })),
            video("v2", json!({ "categoryTitle": "Thai" })),
            video("v3", json!({ "playlistTitle": ["Top 50", "best of BOLLYWOOD"] })),
            video("v4", json!({ "playlistTitle": "Indonesia Hits" })),
        ]);
        let rows = youtube_rows(&set, &YoutubeFilter::standard().unwrap());
        let ids: Vec<_> = rows.iter().map(|r| r.native_id.as_str()).collect();
        assert_eq!(ids, ["v1"]);
    }

    #[test]
    fn emoji_are_stripped_and_dates_lose_their_time() {
        let set = parse_youtube_values(vec![
            video("v1", json!({ "songTitleShort": "Sunny Day \u{1F600}\u{2600}",
                                "playlistTitle": "\u{1F525} Fire Mix",
                                "publishDate": "2024-03-05T12:30:00-08:00" })),
            video("v1", json!({ "publishDate": "2024-04-01" })),
        ]);
        let rows = youtube_rows(&set, &YoutubeFilter::standard().unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].song.as_deref(), Some("Song X"));
        assert!(rows[0].playlist.contains("Fire Mix"));
        assert_eq!(rows[0].publish_date.as_deref(), Some("2024-03-05"));

        let one = parse_youtube_values(vec![
            video("v2", json!({ "songTitleShort": "\u{1F3B5} Sunny Day \u{2764}" })),
        ]);
        let rows = youtube_rows(&one, &YoutubeFilter::standard().unwrap());
        assert_eq!(rows[0].song.as_deref(), Some("Sunny Day"));
    }

    #[test]
    fn language_is_detected_by_script_then_letter_share() {
        let t = LANGUAGE_THRESHOLD;
        assert_eq!(detect_language(None, t), Language::Unknown);
        assert_eq!(detect_language(Some(""), t), Language::Unknown);
        assert_eq!(detect_language(Some("사랑해 love"), t), Language::Korean);
        assert_eq!(detect_language(Some("こんにちは 世界"), t), Language::Japanese);
        assert_eq!(detect_language(Some("我爱你"), t), Language::Chinese);
        assert_eq!(detect_language(Some("Hello world"), t), Language::English);
        assert_eq!(detect_language(Some("Привет мир"), t), Language::Other);
        assert_eq!(detect_language(Some("12 34 ab"), t), Language::Other);
    }

    #[test]
    fn lyrics_decide_language_before_the_title_and_other_is_dropped() {
        let set = parse_youtube_values(vec![
            video("v1", json!({ "lyrics": "눈이 내리네", "language": "English" })),
            video("v2", json!({ "lyrics": "", "language": "Spanish" })),
            video("v3", json!({ "lyrics": "Привет, как дела сегодня" })),
            video("v4", json!({ "songTitleShort": "Ищу тебя" })),
            video("v5", json!({ "songTitleShort": "\u{1F600}", "language": "Korean" })),
        ]);
        let rows = youtube_rows(&set, &YoutubeFilter::standard().unwrap());
        let langs: Vec<_> = rows.iter()
            .map(|r| (r.native_id.as_str(), r.language.as_deref()))
            .collect();
        assert_eq!(langs, [("v1", Some("Korean")), ("v2", Some("English")), ("v5", Some("Korean"))]);
    }

    #[test]
    fn youtube_authors_keep_credit_order() {
        let set = parse_youtube_values(vec![
            video("v1", json!({ "author": ["Zed", "Amy"] })),
            video("v1", json!({ "author": "{Zed,Amy,Bob}" })),
        ]);
        let rows = youtube_rows(&set, &YoutubeFilter::standard().unwrap());
        assert_eq!(rows[0].artist, vec!["Zed", "Amy", "Bob"]);
    }
}
