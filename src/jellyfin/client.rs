// Jellyfin REST client.
//
// Auth is a static API token in the X-MediaBrowser-Token header; the acting
// user travels as a parameter per call. The image upload endpoint is the
// odd one out: it wants a base64-encoded body and a MediaBrowser
// Authorization header instead of the plain token header.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::traits::JellyfinApi;

const CLIENT_NAME: &str = "mixtape";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
/// The bot is a singleton; a fixed device id keeps its sessions collapsed
/// into one entry on the server's device list.
const DEVICE_ID: &str = "mixtape-bot";

/// Items listings are paged; one oversized page covers any home library.
const ITEMS_PAGE_LIMIT: u32 = 50_000;

/// Authenticated client for one Jellyfin server.
pub struct JellyfinClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl JellyfinClient {
    /// Create a client for the given server.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "X-MediaBrowser-Token",
            api_key
                .parse()
                .context("API key contains invalid header characters")?,
        );

        let client = reqwest::Client::builder()
            .user_agent(format!("{CLIENT_NAME}/{CLIENT_VERSION}"))
            .default_headers(headers)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// GET an endpoint and deserialize the JSON response.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint = endpoint, "Jellyfin GET");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Jellyfin request failed: GET {endpoint}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Jellyfin GET {endpoint} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {endpoint} response"))
    }

    /// POST an endpoint with an optional JSON body. Returns the response
    /// body when there is one (several mutations answer 204 No Content).
    async fn post_json(
        &self,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Option<serde_json::Value>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint = endpoint, "Jellyfin POST");

        let request = self.client.post(&url);
        let request = match body {
            Some(json) => request.json(json),
            None => request,
        };

        let response = request
            .send()
            .await
            .with_context(|| format!("Jellyfin request failed: POST {endpoint}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Jellyfin POST {endpoint} returned {status}: {body}");
        }

        let text = response.text().await.unwrap_or_default();
        if text.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .with_context(|| format!("Failed to deserialize {endpoint} response"))
    }

    /// List every user account on the server.
    pub async fn users(&self) -> Result<Vec<JellyfinUser>> {
        self.get_json("Users", &[]).await
    }

    /// List a user's visible playlist items.
    pub async fn playlists(&self, user_id: &str) -> Result<Vec<ItemSummary>> {
        let endpoint = format!("Users/{user_id}/Items");
        let page: ItemsPage<ItemSummary> = self
            .get_json(
                &endpoint,
                &[
                    ("Recursive", "true"),
                    ("IncludeItemTypes", "Playlist"),
                    ("UserId", user_id),
                ],
            )
            .await?;
        Ok(page.items)
    }

    /// Create an empty audio playlist owned by the user; returns its id.
    pub async fn create_playlist(&self, name: &str, user_id: &str) -> Result<String> {
        let payload = json!({
            "Name": name,
            "UserId": user_id,
            "MediaType": "Audio",
        });

        let body = self
            .post_json("Playlists", Some(&payload))
            .await
            .with_context(|| format!("Failed to create playlist '{name}'"))?
            .ok_or_else(|| anyhow::anyhow!("Playlist creation returned no content"))?;

        let created: CreatedPlaylist =
            serde_json::from_value(body).context("Failed to parse created playlist")?;

        info!(name = name, id = %created.id, "Created playlist");
        Ok(created.id)
    }

    /// Append items to a playlist. The server decides de-duplication and
    /// ordering of entries.
    pub async fn add_to_playlist(&self, playlist_id: &str, item_ids: &[String]) -> Result<()> {
        let endpoint = format!("Playlists/{playlist_id}");
        let payload = json!({ "Ids": item_ids });

        self.post_json(&endpoint, Some(&payload))
            .await
            .with_context(|| format!("Failed to add items to playlist {playlist_id}"))?;

        info!(playlist = playlist_id, count = item_ids.len(), "Added items to playlist");
        Ok(())
    }

    /// List the server's media folders (all collection types).
    pub async fn media_folders(&self) -> Result<Vec<MediaFolder>> {
        let page: ItemsPage<MediaFolder> = self.get_json("Library/MediaFolders", &[]).await?;
        Ok(page.items)
    }

    /// List every audio item under a library root, with filesystem paths.
    pub async fn audio_items(&self, parent_id: &str, user_id: &str) -> Result<Vec<AudioItem>> {
        let limit = ITEMS_PAGE_LIMIT.to_string();
        let page: ItemsPage<AudioItem> = self
            .get_json(
                "Items",
                &[
                    ("Recursive", "true"),
                    ("ParentId", parent_id),
                    ("IncludeItemTypes", "Audio"),
                    ("Fields", "Path"),
                    ("UserId", user_id),
                    ("Limit", &limit),
                ],
            )
            .await?;
        Ok(page.items)
    }

    /// Trigger a full library scan. The scan runs asynchronously on the
    /// server; this call returns as soon as it is queued.
    pub async fn refresh_library(&self) -> Result<()> {
        self.post_json("Library/Refresh", None)
            .await
            .context("Failed to trigger library scan")?;
        info!("Library scan queued");
        Ok(())
    }

    /// Upload a playlist's primary image.
    ///
    /// The endpoint expects the raw image base64-encoded as the request
    /// body, with the real content type in the header.
    pub async fn upload_playlist_cover(
        &self,
        playlist_id: &str,
        image: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = format!("{}/Items/{playlist_id}/Images/Primary/0", self.base_url);
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        let authorization = format!(
            "MediaBrowser Client=\"{CLIENT_NAME}\", Device=\"{CLIENT_NAME}\", \
             DeviceId=\"{DEVICE_ID}\", Version=\"{CLIENT_VERSION}\", Token=\"{}\"",
            self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(encoded)
            .send()
            .await
            .with_context(|| format!("Cover upload failed for playlist {playlist_id}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Cover upload for playlist {playlist_id} returned {status}: {body}");
        }

        info!(playlist = playlist_id, "Uploaded playlist cover");
        Ok(())
    }
}

// -- Serde types for the Jellyfin REST surface --

#[derive(Debug, Clone, Deserialize)]
pub struct JellyfinUser {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// A playlist-type item from a user's item listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub item_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFolder {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "CollectionType", default)]
    pub collection_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioItem {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Path", default)]
    pub path: Option<String>,
}

#[derive(Deserialize)]
struct ItemsPage<T> {
    #[serde(rename = "Items", default)]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct CreatedPlaylist {
    #[serde(rename = "Id")]
    id: String,
}

#[async_trait]
impl JellyfinApi for JellyfinClient {
    async fn users(&self) -> Result<Vec<JellyfinUser>> {
        JellyfinClient::users(self).await
    }

    async fn playlists(&self, user_id: &str) -> Result<Vec<ItemSummary>> {
        JellyfinClient::playlists(self, user_id).await
    }

    async fn create_playlist(&self, name: &str, user_id: &str) -> Result<String> {
        JellyfinClient::create_playlist(self, name, user_id).await
    }

    async fn add_to_playlist(&self, playlist_id: &str, item_ids: &[String]) -> Result<()> {
        JellyfinClient::add_to_playlist(self, playlist_id, item_ids).await
    }

    async fn media_folders(&self) -> Result<Vec<MediaFolder>> {
        JellyfinClient::media_folders(self).await
    }

    async fn audio_items(&self, parent_id: &str, user_id: &str) -> Result<Vec<AudioItem>> {
        JellyfinClient::audio_items(self, parent_id, user_id).await
    }

    async fn refresh_library(&self) -> Result<()> {
        JellyfinClient::refresh_library(self).await
    }

    async fn upload_playlist_cover(
        &self,
        playlist_id: &str,
        image: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        JellyfinClient::upload_playlist_cover(self, playlist_id, image, content_type).await
    }
}
