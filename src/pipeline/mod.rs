// Processing pipeline — the stages between an unread notification and a
// synced playlist, plus the follower-reconciliation pass.
//
// Stage failures are contained per notification: one bad share never
// affects the rest of the batch, and nothing is retried within a pass.

pub mod dispatch;
pub mod friends;
pub mod ingest;
pub mod sync;

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::Config;
use crate::deezer::traits::DeezerApi;
use crate::engine::traits::{DownloadOutcome, Downloader};
use crate::jellyfin::library::LibraryIndex;
use crate::jellyfin::traits::JellyfinApi;

use ingest::DownloadRequest;

/// Run one full download-pipeline pass: poll, then download and sync each
/// share. Per-notification failures are logged and skipped; an error
/// returned from here is one that poisons the whole pass (polling failed,
/// or the session died).
pub async fn run_download_pass(
    deezer: &dyn DeezerApi,
    jellyfin: &dyn JellyfinApi,
    engine: &dyn Downloader,
    config: &Config,
) -> Result<()> {
    let requests = ingest::poll(deezer, &config.deezer.share_base_url).await?;
    if requests.is_empty() {
        return Ok(());
    }

    // One index per pass: every notification in the batch shares it, the
    // next pass starts fresh.
    let mut index = LibraryIndex::new();

    for request in &requests {
        if let Err(e) = process_request(jellyfin, engine, &mut index, config, request).await {
            warn!(
                notification = request.notification_id,
                sender = %request.sender,
                "Share processing failed, moving on: {e:#}"
            );
        }
    }

    Ok(())
}

async fn process_request(
    jellyfin: &dyn JellyfinApi,
    engine: &dyn Downloader,
    index: &mut LibraryIndex,
    config: &Config,
    request: &DownloadRequest,
) -> Result<()> {
    let outcome = dispatch::dispatch(
        engine,
        &config.downloads,
        &config.engine.audio_quality,
        request,
    )
    .await?;

    match outcome {
        DownloadOutcome::Track | DownloadOutcome::Album => {
            // Singles and albums land in the library as plain files; only
            // playlists need server-side assembly.
            debug!(kind = %request.kind, "No playlist to sync for this share");
            Ok(())
        }
        DownloadOutcome::Playlist(download) => {
            sync::sync_playlist(
                jellyfin,
                index,
                &download,
                &request.sender,
                config.jellyfin.refresh_before_resolve,
            )
            .await
        }
    }
}
