use std::path::Path;

use crate::episode::PARTIAL_SUFFIX;
use crate::error::StateError;

/// State of the output directory at the start of a run
#[derive(Debug, Clone)]
pub struct OutputState {
    /// Number of partial files that were cleaned up during scan
    pub partial_files_cleaned: usize,
}

/// Prepare the output directory for a run
///
/// Creates the directory if needed and removes `.partial` files left behind
/// by interrupted runs. Whether an episode is already present is decided per
/// episode, right before it would be fetched.
pub fn scan_output_dir(output_dir: &Path) -> Result<OutputState, StateError> {
    let mut partial_files_cleaned = 0;

    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir).map_err(|e| StateError::CreateDirectoryFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        return Ok(OutputState {
            partial_files_cleaned: 0,
        });
    }

    if !output_dir.is_dir() {
        return Err(StateError::NotADirectory(output_dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(output_dir).map_err(|e| StateError::ReadDirectoryFailed {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| StateError::ReadDirectoryFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(PARTIAL_SUFFIX));

        if is_partial && path.is_file() && std::fs::remove_file(&path).is_ok() {
            partial_files_cleaned += 1;
        }
    }

    Ok(OutputState { partial_files_cleaned })
}
