use std::path::Path;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Outcome of streaming an episode's segments to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub bytes_downloaded: u64,
    /// "sha256:<hex>" of the written audio
    pub content_hash: String,
}

/// Download `segments` in order and concatenate them into `output_path`
///
/// Streams each response body to disk, hashing as it goes and reporting
/// progress through the reporter. The caller owns cleanup of `output_path`
/// on failure.
pub async fn download_segments<C: HttpClient>(
    client: &C,
    episode_id: &str,
    segments: &[Url],
    output_path: &Path,
    reporter: &SharedProgressReporter,
) -> Result<DownloadResult, DownloadError> {
    reporter.report(ProgressEvent::DownloadStarting {
        episode_id: episode_id.to_string(),
        total_segments: segments.len(),
    });

    let mut file =
        File::create(output_path)
            .await
            .map_err(|e| DownloadError::FileCreateFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

    let mut hasher = Sha256::new();
    let mut bytes_downloaded: u64 = 0;

    for (segment_index, segment) in segments.iter().enumerate() {
        let url = segment.as_str();

        let response = client
            .get_stream(url)
            .await
            .map_err(|e| DownloadError::HttpFailed {
                url: url.to_string(),
                source: e,
            })?;

        if response.status >= 400 {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        let mut stream = response.body;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
                url: url.to_string(),
                source: e,
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::FileWriteFailed {
                    path: output_path.to_path_buf(),
                    source: e,
                })?;

            hasher.update(&chunk);
            bytes_downloaded += chunk.len() as u64;

            reporter.report(ProgressEvent::DownloadProgress {
                episode_id: episode_id.to_string(),
                segment_index,
                total_segments: segments.len(),
                bytes_downloaded,
            });
        }
    }

    // Ensure all data is on disk before anyone renames the file into place
    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;
    file.sync_all()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    Ok(DownloadResult {
        bytes_downloaded,
        content_hash: format!("sha256:{:x}", hasher.finalize()),
    })
}
