use std::sync::Arc;

/// Byte-level events emitted while an episode is being downloaded
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Audio segments were resolved and the download is starting
    DownloadStarting {
        episode_id: String,
        /// Number of remote segments making up the episode
        total_segments: usize,
    },

    /// Download progress update
    DownloadProgress {
        episode_id: String,
        /// Zero-based index of the segment currently streaming
        segment_index: usize,
        total_segments: usize,
        bytes_downloaded: u64,
    },

    /// Audio is complete and is being moved into place
    Finalizing { episode_id: String },

    /// A download completed successfully
    DownloadCompleted {
        episode_id: String,
        bytes_downloaded: u64,
    },

    /// A download failed
    DownloadFailed { episode_id: String, error: String },
}

/// Trait for reporting download progress.
///
/// Implementations can use this to display progress bars or collect
/// statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
