// Download dispatch — policy around the engine invocation.
//
// Resolves where the files should land, pins the duplicate-handling and
// playlist-file options, and hands the share URL to the engine. An engine
// failure aborts the notification here; no sync is attempted for it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::DownloadsConfig;
use crate::engine::traits::{DownloadOptions, DownloadOutcome, Downloader, DuplicateMode};

use super::ingest::DownloadRequest;

/// Where a sender's downloads land: the base directory, or a per-sender
/// subdirectory of it when that policy is enabled.
pub fn target_directory(downloads: &DownloadsConfig, sender: &str) -> PathBuf {
    let base = PathBuf::from(&downloads.music_download_path);
    if downloads.per_user_directory {
        base.join(sender)
    } else {
        base
    }
}

/// Invoke the engine for one request and return its normalized outcome.
pub async fn dispatch(
    engine: &dyn Downloader,
    downloads: &DownloadsConfig,
    quality: &str,
    request: &DownloadRequest,
) -> Result<DownloadOutcome> {
    let target = target_directory(downloads, &request.sender);

    let options = DownloadOptions {
        duplicates: DuplicateMode::Hardlink,
        playlist_files: false,
        quality: quality.to_string(),
    };

    info!(
        kind = %request.kind,
        url = %request.share_url,
        target = %target.display(),
        "Starting download"
    );

    let outcome = engine
        .download(&request.share_url, &target, &options)
        .await
        .with_context(|| format!("Download failed for {}", request.share_url))?;

    info!(kind = %request.kind, "Download finished");
    Ok(outcome)
}
