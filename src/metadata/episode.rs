use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::Episode;
use crate::error::MetadataError;

/// Serializable sidecar for a materialized episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub id: String,
    pub show_id: String,
    pub station: String,
    /// RFC 3339, in the show's local offset
    pub recorded_at: String,
    pub duration_secs: i64,
    pub original_url: String,
    pub segments: usize,
    pub audio_filename: String,
    pub size_bytes: u64,
    pub downloaded_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl EpisodeMetadata {
    /// Create metadata for a freshly downloaded episode
    pub fn from_episode(
        episode: &Episode,
        audio_filename: &str,
        segments: usize,
        size_bytes: u64,
        content_hash: Option<String>,
    ) -> Self {
        Self {
            id: episode.id(),
            show_id: episode.show_id.clone(),
            station: episode.station.clone(),
            recorded_at: episode.recorded_at.to_rfc3339(),
            duration_secs: episode.duration.num_seconds(),
            original_url: episode.locator.to_string(),
            segments,
            audio_filename: audio_filename.to_string(),
            size_bytes,
            downloaded_at: Utc::now().to_rfc3339(),
            content_hash,
        }
    }
}

/// Write episode metadata to a JSON file
pub fn write_episode_metadata(metadata: &EpisodeMetadata, path: &Path) -> Result<(), MetadataError> {
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(path, json).map_err(|e| MetadataError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read episode metadata from a JSON file
pub fn read_episode_metadata(path: &Path) -> Result<EpisodeMetadata, MetadataError> {
    let content = std::fs::read_to_string(path).map_err(|e| MetadataError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| MetadataError::JsonParseFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
