use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading the show configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Bad format for show id {0:?} (only letters, digits, '-' and '_' allowed)")]
    InvalidShowId(String),

    #[error("Invalid cron expression {expression:?} for show {show_id}: {reason}")]
    InvalidCron {
        show_id: String,
        expression: String,
        reason: String,
    },

    #[error("Unknown timezone {timezone:?} for show {show_id}")]
    InvalidTimezone { show_id: String, timezone: String },

    #[error("Show {0} must have a duration greater than zero")]
    InvalidDuration(String),

    #[error("Config file {0} does not define any show")]
    NoShows(PathBuf),
}

/// Errors around the history (checkpoint) file
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("No history file at {0}; indicate a start point with --since")]
    Missing(PathBuf),

    #[error("History file {0} already exists; refusing to combine it with --since")]
    Conflict(PathBuf),

    #[error("Failed to read history file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History file {path} holds an unparseable timestamp {value:?}")]
    InvalidTimestamp { path: PathBuf, value: String },

    #[error("Failed to write history file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by the remote catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Remote service unavailable at {url}: {reason}")]
    RemoteUnavailable { url: String, reason: String },

    #[error("Station {station:?} not found at {url}")]
    NotFound { station: String, url: String },

    #[error("Unexpected content from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("No audio chunks cover episode {episode_id}")]
    NoSegments { episode_id: String },
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Could not resolve audio for episode {episode_id}: {source}")]
    Unresolved {
        episode_id: String,
        #[source]
        source: CatalogError,
    },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to move {from} into place: {source}")]
    RenameFailed {
        from: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

/// Errors that can occur during metadata operations
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read metadata file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write metadata file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse metadata JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// Errors that can occur when preparing the output directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Output path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal errors for a sync run. Per-show and per-episode failures are not
/// here: they are collected in the run report instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}
