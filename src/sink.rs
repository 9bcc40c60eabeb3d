//!
//! src/sink.rs  Andrew Belles  Oct 8th, 2025
//!
//! Disk persistence for reconciled entities and the raw per-source record
//! sets they were built from. Everything lands as zstd-compressed jsonl,
//! written to a temp file beside the target and persisted in one rename.
//!

use std::{fs, io::Write, path::{Path, PathBuf}};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::errors::HarvestError;
use crate::types::{CanonicalEntity, SourceRecordSet};

/// Receives the fully resolved rows of one run
pub trait EntitySink {
    fn persist(&self, entities: &[CanonicalEntity], run_date: NaiveDate) ->
        Result<PathBuf, HarvestError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    PlaylistTrack,
    AudioFeatures,
    VideoRecord
}

impl RawKind {
    fn as_str(self) -> &'static str {
        match self {
            RawKind::PlaylistTrack => "playlist_track",
            RawKind::AudioFeatures => "audio_features",
            RawKind::VideoRecord   => "video_record"
        }
    }
}

pub struct DiskZstdSink {
    root: PathBuf,
    level: i32
}

impl DiskZstdSink {
    pub fn new(root: impl AsRef<Path>, level: i32) -> Self {
        Self { root: root.as_ref().to_path_buf(), level: level.clamp(0, 21) }
    }

    pub fn write_raw<R: Serialize>(
        &self,
        kind: RawKind,
        set: &SourceRecordSet<R>,
        run_date: NaiveDate
    ) -> Result<PathBuf, HarvestError> {
        let rel = PathBuf::from("raw")
            .join(Self::sanitize_key(set.source.as_str()))
            .join(kind.as_str())
            .join(format!("{run_date}.jsonl.zst"));
        let path = self.write_lines(&rel, &set.records)?;
        info!(source = %set.source, kind = kind.as_str(), rows = set.len(),
            path = %path.display(), "sink.raw.written");
        Ok(path)
    }

    fn write_lines<T: Serialize>(&self, rel: &Path, rows: &[T]) -> Result<PathBuf, HarvestError> {
        let path = self.root.join(rel);
        let parent = path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        fs::create_dir_all(&parent).map_err(|e|
            HarvestError::Sink(format!("create dir {}: {e}", parent.display())))?;

        let temp = tempfile::NamedTempFile::new_in(&parent).map_err(|e|
            HarvestError::Sink(format!("tempfile in {}: {e}", parent.display())))?;

        {
            let mut enc = zstd::stream::write::Encoder::new(temp.as_file(), self.level)
                .map_err(|e| HarvestError::Sink(format!("zstd encoder: {e}")))?;

            for row in rows {
                serde_json::to_writer(&mut enc, row)
                    .map_err(|e| HarvestError::Sink(format!("serialize row: {e}")))?;
                enc.write_all(b"\n")?;
            }
            enc.finish().map_err(|e| HarvestError::Sink(format!("zstd finish: {e}")))?;
        }

        temp.persist(&path).map_err(|e|
            HarvestError::Sink(format!("persist {}: {e}", path.display())))?;

        Ok(path)
    }

    fn sanitize_key(key: &str) -> String {
        key.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

impl EntitySink for DiskZstdSink {
    fn persist(&self, entities: &[CanonicalEntity], run_date: NaiveDate) ->
        Result<PathBuf, HarvestError> {
        let rel = PathBuf::from("canonical").join(format!("{run_date}.jsonl.zst"));
        let path = self.write_lines(&rel, entities)?;
        info!(rows = entities.len(), path = %path.display(), "sink.canonical.written");
        Ok(path)
    }
}

/// Loads the video catalog export, a json array of row objects
pub fn load_youtube_values(path: &Path) -> Result<Vec<Value>, HarvestError> {
    let text = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(rows) => Ok(rows),
        other => Err(HarvestError::Parse(format!(
            "{}: expected a json array of records, found {}",
            path.display(),
            match other {
                Value::Object(_) => "an object",
                Value::Null => "null",
                _ => "a scalar"
            }
        )))
    }
}
