// Downloader trait — the swap-ready abstraction over the content-download
// engine, plus the normalized outcome types every implementation reports.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

/// How the engine should handle a file that already exists in the library.
///
/// Jellyfin's scanner rejects symlinks and double-counts copies, so
/// hardlink is the only mode the bot ever requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateMode {
    Hardlink,
}

impl DuplicateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DuplicateMode::Hardlink => "hardlink",
        }
    }
}

/// Per-invocation engine options.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub duplicates: DuplicateMode,
    /// Whether the engine should emit .m3u files alongside the audio.
    /// Always false here: playlist membership is modeled natively in the
    /// media server instead.
    pub playlist_files: bool,
    /// Preferred audio quality, passed through verbatim.
    pub quality: String,
}

/// Normalized result of a successful engine run.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    Track,
    Album,
    Playlist(PlaylistDownload),
}

/// Extra data the engine reports for playlist downloads.
#[derive(Debug, Clone)]
pub struct PlaylistDownload {
    pub name: String,
    /// Absolute paths of the downloaded songs, in playlist order.
    pub songs: Vec<PathBuf>,
    pub cover: Option<PathBuf>,
}

/// Trait for downloading shared content. Implementations are async because
/// a download is a long remote operation.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download the shared content at `url` into `target_dir`.
    async fn download(
        &self,
        url: &str,
        target_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome>;
}
