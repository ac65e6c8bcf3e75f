// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Window};
use crate::config::Show;
use crate::episode::{MaterializeOutcome, materialize_episode};
use crate::error::SyncError;
use crate::history::{Checkpoint, StartPoint, resolve_start, save_history};
use crate::http::HttpClient;
use crate::metadata::write_show_metadata;
use crate::progress::SharedProgressReporter;
use crate::state::scan_output_dir;

/// Options for a sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Directory receiving audio and metadata files
    pub output_dir: PathBuf,
    /// File holding the checkpoint between runs
    pub history_path: PathBuf,
    /// Explicit first day to fetch; only allowed when there is no history
    pub since: Option<NaiveDate>,
    /// When this run started; the upper bound of the window
    pub run_started: DateTime<Utc>,
}

/// Result of a sync run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Span of the queried windows, from the earliest show start to the run start
    pub window: Window,
    /// Number of episodes downloaded by this run
    pub downloaded: usize,
    /// Number of episodes already present in the output directory
    pub existing: usize,
    /// Number of episodes still on air, left for the next run
    pub deferred: usize,
    /// Shows whose listing failed (show id, error message)
    pub failed_shows: Vec<(String, String)>,
    /// Episodes that failed to materialize (episode id, error message)
    pub failed_episodes: Vec<(String, String)>,
    /// Checkpoint the run started from
    pub previous_checkpoint: Checkpoint,
    /// Checkpoint to persist after the run
    pub checkpoint: Checkpoint,
}

impl SyncReport {
    fn new(window: Window, checkpoint: Checkpoint) -> Self {
        Self {
            window,
            downloaded: 0,
            existing: 0,
            deferred: 0,
            failed_shows: Vec::new(),
            failed_episodes: Vec::new(),
            previous_checkpoint: checkpoint,
            checkpoint,
        }
    }

    /// Every show listed and every episode materialized
    pub fn is_clean(&self) -> bool {
        self.failed_shows.is_empty() && self.failed_episodes.is_empty()
    }

    pub fn checkpoint_advanced(&self) -> bool {
        self.checkpoint > self.previous_checkpoint
    }
}

/// Run a full sync: preflight checks, all shows, then the checkpoint
///
/// Errors returned here are fatal and happen before anything is fetched
/// (configuration of the history file, output directory), or when the new
/// checkpoint cannot be written. Failures of single shows or episodes are
/// collected in the report instead.
pub async fn run_sync<C, K>(
    client: &C,
    catalog: &K,
    shows: &[Show],
    options: &SyncOptions,
    reporter: SharedProgressReporter,
) -> Result<SyncReport, SyncError>
where
    C: HttpClient,
    K: Catalog + ?Sized,
{
    let start = resolve_start(&options.history_path, options.since)?;
    match start {
        StartPoint::Checkpoint(checkpoint) => {
            info!(since = %checkpoint, until = %options.run_started, "Resolved fetch window");
        }
        StartPoint::Date(date) => {
            info!(since = %date, until = %options.run_started, "Starting from local midnight of each show");
        }
    }

    let state = scan_output_dir(&options.output_dir)?;
    if state.partial_files_cleaned > 0 {
        info!(
            count = state.partial_files_cleaned,
            "Removed partial files from an interrupted run"
        );
    }

    let report = sync_shows(
        client,
        catalog,
        shows,
        start,
        options.run_started,
        &options.output_dir,
        &reporter,
    )
    .await;

    // First runs always record where they started
    if report.checkpoint_advanced() || matches!(start, StartPoint::Date(_)) {
        save_history(&options.history_path, report.checkpoint)?;
        info!(checkpoint = %report.checkpoint, "Saved history");
    }

    Ok(report)
}

/// Sync every show sequentially, starting from `start`
///
/// Each show is queried from `start` as seen in its own timezone. The report
/// starts from the earliest of those instants, and its `checkpoint` advances
/// to `run_started` only if the whole run was clean. Episodes still on air at `run_started` are left
/// for the next run, and the checkpoint stops at the earliest of them.
pub async fn sync_shows<C, K>(
    client: &C,
    catalog: &K,
    shows: &[Show],
    start: StartPoint,
    run_started: DateTime<Utc>,
    output_dir: &Path,
    reporter: &SharedProgressReporter,
) -> SyncReport
where
    C: HttpClient,
    K: Catalog + ?Sized,
{
    let checkpoint = start.earliest(shows.iter().map(|show| show.timezone));
    let mut report = SyncReport::new(Window::new(checkpoint.at(), run_started), checkpoint);
    let mut complete_until = run_started;

    for show in shows {
        let window = Window::new(start.at_in(show.timezone), run_started);
        info!(show = %show.id, since = %window.since, "Processing show {}", show.name);

        if let Err(e) = write_show_metadata(show, output_dir) {
            warn!(show = %show.id, error = %e, "Could not write show metadata");
        }

        let episodes = match catalog.list_episodes(show, window).await {
            Ok(episodes) => episodes,
            Err(e) => {
                warn!(show = %show.id, error = %e, "Skipping show for this run");
                report.failed_shows.push((show.id.clone(), e.to_string()));
                continue;
            }
        };

        for episode in episodes {
            let episode_id = episode.id();

            if !window.contains(episode.starts_at()) {
                debug!(episode = %episode_id, "Outside the fetch window");
                continue;
            }

            if episode.ends_at() > run_started {
                info!(episode = %episode_id, "Still on air, leaving it for the next run");
                report.deferred += 1;
                complete_until = complete_until.min(episode.starts_at());
                continue;
            }

            match materialize_episode(client, catalog, &episode, output_dir, reporter).await {
                Ok(MaterializeOutcome::Created {
                    bytes_downloaded, ..
                }) => {
                    info!(episode = %episode_id, bytes = bytes_downloaded, "Downloaded");
                    report.downloaded += 1;
                }
                Ok(MaterializeOutcome::AlreadyExists) => {
                    info!(episode = %episode_id, "Already present");
                    report.existing += 1;
                }
                Err(e) => {
                    warn!(episode = %episode_id, error = %e, "Download failed");
                    report.failed_episodes.push((episode_id, e.to_string()));
                }
            }
        }
    }

    if report.is_clean() {
        report.checkpoint = checkpoint.advance(complete_until);
    } else {
        warn!(
            failed_shows = report.failed_shows.len(),
            failed_episodes = report.failed_episodes.len(),
            checkpoint = %checkpoint,
            "Run had failures; history stays put so the next run retries"
        );
    }

    report
}
