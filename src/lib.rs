pub mod catalog;
pub mod config;
pub mod episode;
pub mod error;
pub mod history;
pub mod http;
pub mod metadata;
pub mod progress;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use catalog::{Catalog, DEFAULT_SITE_URL, Episode, RadiocutCatalog, Window};
pub use config::{Show, load_config};
pub use episode::{MaterializeOutcome, materialize_episode};
pub use error::{
    CatalogError, ConfigError, DownloadError, HistoryError, MetadataError, StateError, SyncError,
};
pub use history::{Checkpoint, StartPoint, load_history, resolve_start, save_history};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use sync::{SyncOptions, SyncReport, run_sync, sync_shows};
