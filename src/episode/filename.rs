use std::path::{Path, PathBuf};

use crate::catalog::Episode;

/// radiocut chunks are MP3 frames, so the joined audio is MP3 too
pub const AUDIO_EXTENSION: &str = "mp3";

/// Suffix of files still being written
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Audio file name for an episode: "<id>.mp3"
pub fn audio_filename(episode: &Episode) -> String {
    format!("{}.{}", episode.id(), AUDIO_EXTENSION)
}

/// Metadata sidecar name for an episode: "<id>.json"
pub fn metadata_filename(episode: &Episode) -> String {
    format!("{}.json", episode.id())
}

/// Temporary name used while `path` is being written
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeDelta, TimeZone};
    use url::Url;

    fn make_episode(hour: u32, minute: u32) -> Episode {
        Episode {
            show_id: "latenight".to_string(),
            station: "metro951".to_string(),
            recorded_at: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 9, hour, minute, 0)
                .unwrap(),
            duration: TimeDelta::hours(1),
            locator: Url::parse("https://radiocut.fm/radiostation/metro951/").unwrap(),
        }
    }

    #[test]
    fn audio_and_metadata_share_the_episode_id() {
        let episode = make_episode(23, 0);
        assert_eq!(audio_filename(&episode), "latenight_2024-03-09_2300.mp3");
        assert_eq!(metadata_filename(&episode), "latenight_2024-03-09_2300.json");
    }

    #[test]
    fn same_day_episodes_get_distinct_names() {
        assert_ne!(
            audio_filename(&make_episode(9, 0)),
            audio_filename(&make_episode(21, 30))
        );
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/podcasts/show_2024-01-02_0900.mp3")),
            PathBuf::from("/podcasts/show_2024-01-02_0900.mp3.partial")
        );
    }
}
