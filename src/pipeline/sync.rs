// Playlist synchronization — downloaded files become a named, cover-
// illustrated playlist on the media server.
//
// Each step tolerates its own failures where that is survivable: a missing
// user or an ugly cover never blocks the songs, and an unresolved song
// never blocks its neighbors. A remote error on the playlist mutations
// themselves abandons this sync (the caller logs it); nothing is retried.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::engine::traits::PlaylistDownload;
use crate::jellyfin::client::JellyfinUser;
use crate::jellyfin::library::LibraryIndex;
use crate::jellyfin::traits::JellyfinApi;

/// Mirror a downloaded playlist into the media server for the sender.
pub async fn sync_playlist(
    api: &dyn JellyfinApi,
    index: &mut LibraryIndex,
    download: &PlaylistDownload,
    sender: &str,
    refresh_before_resolve: bool,
) -> Result<()> {
    let Some(user) = find_user(api, sender).await? else {
        warn!(sender = sender, "No matching media-server user, skipping playlist sync");
        return Ok(());
    };

    let playlist_id = get_or_create_playlist(api, &download.name, &user.id).await?;

    if let Some(cover) = &download.cover {
        upload_cover(api, &playlist_id, cover).await;
    }

    if refresh_before_resolve {
        // Best-effort nudge: the scan is asynchronous server-side, so this
        // narrows the indexing gap but cannot close it.
        if let Err(e) = api.refresh_library().await {
            warn!("Library scan request failed, resolving anyway: {e:#}");
        }
    }

    let mut resolved = Vec::new();
    for song in &download.songs {
        let path = song.to_string_lossy();
        match index.resolve(api, &user.id, &path).await? {
            Some(id) => resolved.push(id),
            None => warn!(path = %path, "Song not in the library index yet, skipping"),
        }
    }

    if resolved.is_empty() {
        info!(playlist = %download.name, "No songs resolved, nothing to add");
        return Ok(());
    }

    api.add_to_playlist(&playlist_id, &resolved)
        .await
        .with_context(|| format!("Failed to add songs to playlist '{}'", download.name))?;

    info!(
        playlist = %download.name,
        added = resolved.len(),
        requested = download.songs.len(),
        "Playlist synced"
    );
    Ok(())
}

/// Find the media-server user whose name matches the sender,
/// case-insensitively.
async fn find_user(api: &dyn JellyfinApi, sender: &str) -> Result<Option<JellyfinUser>> {
    let users = api
        .users()
        .await
        .context("Failed to list media-server users")?;
    let wanted = sender.to_lowercase();
    Ok(users.into_iter().find(|u| u.name.to_lowercase() == wanted))
}

/// Return the id of the user's playlist with this exact name, creating it
/// if none exists. Name matching is case-sensitive; calling twice with the
/// same name and owner never creates a duplicate.
pub async fn get_or_create_playlist(
    api: &dyn JellyfinApi,
    name: &str,
    user_id: &str,
) -> Result<String> {
    let items = api
        .playlists(user_id)
        .await
        .context("Failed to list playlists")?;

    if let Some(existing) = items
        .iter()
        .find(|i| i.item_type == "Playlist" && i.name == name)
    {
        debug!(name = name, id = %existing.id, "Found existing playlist");
        return Ok(existing.id.clone());
    }

    info!(name = name, "Playlist not found, creating");
    api.create_playlist(name, user_id)
        .await
        .with_context(|| format!("Failed to create playlist '{name}'"))
}

/// Upload the playlist cover. Unsupported formats, unreadable files, and
/// upload failures are all non-fatal: the playlist syncs without a cover.
async fn upload_cover(api: &dyn JellyfinApi, playlist_id: &str, cover: &Path) {
    let Some(content_type) = image_content_type(cover) else {
        warn!(
            path = %cover.display(),
            "Unsupported cover image format, skipping upload"
        );
        return;
    };

    let bytes = match tokio::fs::read(cover).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                path = %cover.display(),
                error = %e,
                "Could not read cover image, skipping upload"
            );
            return;
        }
    };

    if let Err(e) = api
        .upload_playlist_cover(playlist_id, bytes, content_type)
        .await
    {
        warn!("Cover upload failed, continuing without it: {e:#}");
    }
}

/// Content type for the cover upload. Only JPEG and PNG are accepted by the
/// server for direct upload.
pub fn image_content_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}
