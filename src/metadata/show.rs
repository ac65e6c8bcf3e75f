// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::Show;
use crate::error::MetadataError;

const SHOW_METADATA_SUFFIX: &str = ".show.json";

/// Serializable description of a show, for feed generators reading the
/// output directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowMetadata {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub station: String,
    pub schedule: String,
    pub timezone: String,
    pub duration_secs: i64,
    pub updated_at: String,
}

impl ShowMetadata {
    /// Create metadata from a configured Show
    pub fn from_show(show: &Show) -> Self {
        Self {
            id: show.id.clone(),
            name: show.name.clone(),
            description: show.description.clone(),
            image_url: show.image_url.as_ref().map(|u| u.to_string()),
            station: show.station.clone(),
            schedule: show.cron.clone(),
            timezone: show.timezone.name().to_string(),
            duration_secs: show.duration.num_seconds(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Path of a show's metadata file inside the output directory
pub fn show_metadata_path(output_dir: &Path, show_id: &str) -> PathBuf {
    output_dir.join(format!("{show_id}{SHOW_METADATA_SUFFIX}"))
}

/// Write show metadata to the output directory
pub fn write_show_metadata(show: &Show, output_dir: &Path) -> Result<(), MetadataError> {
    let metadata = ShowMetadata::from_show(show);
    let path = show_metadata_path(output_dir, &show.id);

    let json = serde_json::to_string_pretty(&metadata)?;
    std::fs::write(&path, json).map_err(|e| MetadataError::WriteFailed { path, source: e })
}

/// Read show metadata from the output directory
pub fn read_show_metadata(output_dir: &Path, show_id: &str) -> Result<ShowMetadata, MetadataError> {
    let path = show_metadata_path(output_dir, show_id);

    let content = std::fs::read_to_string(&path).map_err(|e| MetadataError::ReadFailed {
        path: path.clone(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| MetadataError::JsonParseFailed { path, source: e })
}
