//! Newline-delimited snapshot of known media ids
//!
//! Lets a restarted feeder sample ids before the first listing completes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::SnapshotError;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Fail fast when the configured path can never hold a snapshot
pub async fn validate_path(path: &Path) -> Result<(), SnapshotError> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Err(SnapshotError::InvalidPath(path.to_path_buf())),
        _ => Ok(()),
    }
}

/// Read the ids stored at `path`; a missing file yields no ids
pub async fn load_ids(path: &Path) -> Result<Vec<String>, SnapshotError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No metadata snapshot at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(io_error(path)(e)),
    };

    let ids: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    info!("Loaded {} media ids from {}", ids.len(), path.display());
    Ok(ids)
}

/// Replace the snapshot at `path` with `ids`.
///
/// The ids are written to a sibling temporary file which is then renamed over
/// the previous snapshot.
pub async fn write_ids<'a>(
    path: &Path,
    ids: impl IntoIterator<Item = &'a str>,
) -> Result<usize, SnapshotError> {
    let temp_path = temp_path(path);

    let mut contents = String::new();
    let mut count = 0;
    for id in ids {
        contents.push_str(id);
        contents.push('\n');
        count += 1;
    }

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(io_error(&temp_path))?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(io_error(&temp_path))?;
    file.sync_all().await.map_err(io_error(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, path).await.map_err(io_error(path))?;

    info!("Wrote {} media ids to {}", count, path.display());
    Ok(count)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
