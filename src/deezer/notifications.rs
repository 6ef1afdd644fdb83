// Notification model and share-link interpretation.
//
// A share arrives as a notification whose relative url encodes the content
// kind and id (`/playlist/123`). The sender is not a structured field; the
// only trace is the free-text quotation title, whose first word is the
// sender's display name. Brittle, but it is all the gw API exposes.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::client::DeezerClient;

/// One entry of the bot account's notification feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    /// Relative share path, e.g. `/playlist/123`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub quotation: Option<Quotation>,
}

/// Free-text quote block attached to a share notification.
#[derive(Debug, Clone, Deserialize)]
pub struct Quotation {
    #[serde(default)]
    pub title: String,
}

impl Notification {
    /// Derive the sender's display name: the first whitespace-delimited
    /// token of the quotation title. `None` when the quotation is absent
    /// or blank.
    pub fn sender_name(&self) -> Option<String> {
        self.quotation
            .as_ref()?
            .title
            .split_whitespace()
            .next()
            .map(str::to_string)
    }
}

/// Content kind encoded in a share url's second path segment.
///
/// `Unknown` is a distinct variant rather than a parse failure, so callers
/// can log and drop such shares deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Track,
    Album,
    Playlist,
    Unknown,
}

impl ShareKind {
    /// Parse from a relative share path: `/playlist/123` → `Playlist`.
    pub fn from_share_path(path: &str) -> Self {
        match path.split('/').nth(1).unwrap_or("") {
            "track" => ShareKind::Track,
            "album" => ShareKind::Album,
            "playlist" => ShareKind::Playlist,
            _ => ShareKind::Unknown,
        }
    }
}

impl std::fmt::Display for ShareKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShareKind::Track => "track",
            ShareKind::Album => "album",
            ShareKind::Playlist => "playlist",
            ShareKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

impl DeezerClient {
    /// List the bot account's notifications, read and unread.
    pub async fn notifications(&self) -> Result<Vec<Notification>> {
        let results: UserMenuResults = self
            .call("deezer.userMenu", None)
            .await
            .context("Failed to fetch notifications")?;

        let data = results
            .notifications
            .map(|block| block.data)
            .unwrap_or_default();

        debug!(count = data.len(), "Fetched notifications");
        Ok(data)
    }

    /// Mark one notification as read.
    pub async fn mark_read(&self, notification_id: u64) -> Result<()> {
        let payload = json!({ "notif_ids": [notification_id] });
        let _ack: serde_json::Value = self
            .call("notification.markAsRead", Some(payload))
            .await
            .with_context(|| format!("Failed to mark notification {notification_id} as read"))?;
        Ok(())
    }
}

// -- Serde types for deezer.userMenu --

#[derive(Deserialize)]
struct UserMenuResults {
    #[serde(rename = "NOTIFICATIONS")]
    notifications: Option<NotificationsBlock>,
}

#[derive(Deserialize)]
struct NotificationsBlock {
    #[serde(default)]
    data: Vec<Notification>,
}
