// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use tracing::debug;

use crate::catalog::{Catalog, Episode};
use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::metadata::{EpisodeMetadata, write_episode_metadata};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::download::{DownloadResult, download_segments};
use super::filename::{audio_filename, metadata_filename, partial_path};

/// What `materialize_episode` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// Audio and sidecar were written by this call
    Created {
        bytes_downloaded: u64,
        content_hash: String,
    },
    /// The episode's audio was already in the output directory
    AlreadyExists,
}

/// Make sure an episode's audio and metadata sidecar exist in `output_dir`
///
/// The audio file name is derived from the episode id, and its presence is
/// checked before anything touches the network, so repeated calls are cheap
/// and never download twice. Everything is written under `.partial` names
/// and renamed into place only once complete; the sidecar lands before the
/// audio, so a present audio file always has its metadata.
pub async fn materialize_episode<C, K>(
    client: &C,
    catalog: &K,
    episode: &Episode,
    output_dir: &Path,
    reporter: &SharedProgressReporter,
) -> Result<MaterializeOutcome, DownloadError>
where
    C: HttpClient,
    K: Catalog + ?Sized,
{
    let episode_id = episode.id();
    let audio_name = audio_filename(episode);
    let audio_path = output_dir.join(&audio_name);

    if audio_path.exists() {
        debug!(episode = %episode_id, "Audio already present");
        return Ok(MaterializeOutcome::AlreadyExists);
    }

    match fetch_and_write(client, catalog, episode, output_dir, &audio_name, reporter).await {
        Ok(download) => {
            reporter.report(ProgressEvent::DownloadCompleted {
                episode_id,
                bytes_downloaded: download.bytes_downloaded,
            });
            Ok(MaterializeOutcome::Created {
                bytes_downloaded: download.bytes_downloaded,
                content_hash: download.content_hash,
            })
        }
        Err(e) => {
            let metadata_path = output_dir.join(metadata_filename(episode));
            remove_if_present(&partial_path(&audio_path)).await;
            remove_if_present(&partial_path(&metadata_path)).await;
            // A sidecar is only valid next to its audio
            if !audio_path.is_file() {
                remove_if_present(&metadata_path).await;
            }
            reporter.report(ProgressEvent::DownloadFailed {
                episode_id,
                error: e.to_string(),
            });
            Err(e)
        }
    }
}

async fn fetch_and_write<C, K>(
    client: &C,
    catalog: &K,
    episode: &Episode,
    output_dir: &Path,
    audio_name: &str,
    reporter: &SharedProgressReporter,
) -> Result<DownloadResult, DownloadError>
where
    C: HttpClient,
    K: Catalog + ?Sized,
{
    let episode_id = episode.id();
    let audio_path = output_dir.join(audio_name);
    let audio_partial = partial_path(&audio_path);

    let segments = catalog
        .resolve_segments(episode)
        .await
        .map_err(|e| DownloadError::Unresolved {
            episode_id: episode_id.clone(),
            source: e,
        })?;
    debug!(episode = %episode_id, segments = segments.len(), "Resolved audio segments");

    let download =
        download_segments(client, &episode_id, &segments, &audio_partial, reporter).await?;

    reporter.report(ProgressEvent::Finalizing {
        episode_id: episode_id.clone(),
    });

    let metadata = EpisodeMetadata::from_episode(
        episode,
        audio_name,
        segments.len(),
        download.bytes_downloaded,
        Some(download.content_hash.clone()),
    );
    let metadata_path = output_dir.join(metadata_filename(episode));
    let metadata_partial = partial_path(&metadata_path);

    write_episode_metadata(&metadata, &metadata_partial)?;
    rename(&metadata_partial, &metadata_path).await?;
    rename(&audio_partial, &audio_path).await?;

    Ok(download)
}

async fn rename(from: &Path, to: &Path) -> Result<(), DownloadError> {
    if let Err(e) = tokio::fs::rename(from, to).await {
        remove_if_present(from).await;
        return Err(DownloadError::RenameFailed {
            from: from.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

async fn remove_if_present(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}
