// The thin slice of "asset repository" the service needs: turning a request path
// into a filesystem path, and storing a generated artifact under a fresh name.
// Directory browsing (targets, builds, movies, frames) is not provided here.

use chrono::{DateTime, Utc};
use screendiff::ARTIFACT_TIMESTAMP_FORMAT;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Relative paths are joined onto `root` when one is configured; absolute paths
/// are used as given.
pub fn resolve(root: Option<&Path>, requested: &Path) -> PathBuf {
    match root {
        Some(root) if requested.is_relative() => root.join(requested),
        _ => requested.to_path_buf(),
    }
}

/// Timestamp-based artifact name, e.g. `diff_20240131_235959_123.png`.
pub fn artifact_file_name(at: DateTime<Utc>) -> String {
    screendiff::artifact_file_name(at.format(ARTIFACT_TIMESTAMP_FORMAT))
}

/// Writes `png` into `output_dir` and returns the chosen file name. Never
/// overwrites: if two artifacts land on the same millisecond the later one gets
/// a numeric suffix.
pub async fn save_artifact(output_dir: &Path, png: &[u8]) -> std::io::Result<String> {
    tokio::fs::create_dir_all(output_dir).await?;

    let base = artifact_file_name(Utc::now());
    let stem = base.trim_end_matches(".png");
    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => base.clone(),
            n => format!("{stem}_{n}.png"),
        };
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(output_dir.join(&name))
            .await;
        match opened {
            Ok(mut file) => {
                let path = output_dir.join(&name);
                let written = write_flushed(&mut file, png).await;
                drop(file);
                remove_on_error(&path, written).await?;
                return Ok(name);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

async fn write_flushed(file: &mut File, png: &[u8]) -> std::io::Result<()> {
    file.write_all(png).await?;
    file.flush().await
}

/// Deletes a partially written artifact so a failed save leaves nothing behind.
async fn remove_on_error(path: &Path, written: std::io::Result<()>) -> std::io::Result<()> {
    if written.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial artifact");
        }
    }
    written
}
