// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod radiocut;
mod schedule;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use url::Url;

use crate::config::Show;
use crate::error::CatalogError;

pub use radiocut::{DEFAULT_SITE_URL, RadiocutCatalog};
pub use schedule::{RECORDING_MARGIN, ScheduledEpisodes};

/// One recorded instance of a show
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub show_id: String,
    pub station: String,
    /// Start of the recording, in the show's local offset
    pub recorded_at: DateTime<FixedOffset>,
    /// Length of the recording
    pub duration: TimeDelta,
    /// Where the remote service plays this recording
    pub locator: Url,
}

impl Episode {
    /// Stable identifier derived from the show and the local start time
    ///
    /// Format: "<show>_YYYY-MM-DD_HHMM"
    pub fn id(&self) -> String {
        format!(
            "{}_{}",
            self.show_id,
            self.recorded_at.format("%Y-%m-%d_%H%M")
        )
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.recorded_at.with_timezone(&Utc)
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at() + self.duration
    }
}

/// The half-open time range `[since, until)` queried for new episodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl Window {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.since <= instant && instant < self.until
    }
}

/// Lazily produced episodes, oldest first
pub type EpisodeIter = Box<dyn Iterator<Item = Episode> + Send>;

/// The remote service holding the show recordings
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List the episodes of `show` starting inside `window`, oldest first
    ///
    /// Calling this again with the same arguments yields the same episodes.
    async fn list_episodes(&self, show: &Show, window: Window)
    -> Result<EpisodeIter, CatalogError>;

    /// Resolve an episode into the ordered audio segments that make it up
    async fn resolve_segments(&self, episode: &Episode) -> Result<Vec<Url>, CatalogError>;
}
