mod download;
mod filename;
mod materialize;

pub use download::{DownloadResult, download_segments};
pub use filename::{AUDIO_EXTENSION, PARTIAL_SUFFIX, audio_filename, metadata_filename, partial_path};
pub use materialize::{MaterializeOutcome, materialize_episode};
