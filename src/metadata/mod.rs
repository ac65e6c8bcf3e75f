mod episode;
mod show;

pub use episode::{EpisodeMetadata, read_episode_metadata, write_episode_metadata};
pub use show::{ShowMetadata, read_show_metadata, show_metadata_path, write_show_metadata};
