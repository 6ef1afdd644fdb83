// Media-server seam — async interface over the Jellyfin calls the pipeline
// needs. Implementor: JellyfinClient. Tests substitute in-memory mocks.

use anyhow::Result;
use async_trait::async_trait;

use super::client::{AudioItem, ItemSummary, JellyfinUser, MediaFolder};

#[async_trait]
pub trait JellyfinApi: Send + Sync {
    /// List every user account on the server.
    async fn users(&self) -> Result<Vec<JellyfinUser>>;

    /// List a user's visible playlist items.
    async fn playlists(&self, user_id: &str) -> Result<Vec<ItemSummary>>;

    /// Create an empty audio playlist owned by the user; returns its id.
    async fn create_playlist(&self, name: &str, user_id: &str) -> Result<String>;

    /// Append items to a playlist. The server decides de-duplication and
    /// ordering of entries.
    async fn add_to_playlist(&self, playlist_id: &str, item_ids: &[String]) -> Result<()>;

    /// List the server's media folders (all collection types).
    async fn media_folders(&self) -> Result<Vec<MediaFolder>>;

    /// List every audio item under a library root, with filesystem paths.
    async fn audio_items(&self, parent_id: &str, user_id: &str) -> Result<Vec<AudioItem>>;

    /// Queue a full library scan on the server.
    async fn refresh_library(&self) -> Result<()>;

    /// Upload a playlist's primary image.
    async fn upload_playlist_cover(
        &self,
        playlist_id: &str,
        image: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}
