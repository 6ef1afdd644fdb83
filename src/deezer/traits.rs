// Remote social-service seam — async interface over the Deezer calls the
// pipeline needs. Implementor: DeezerClient. Tests substitute in-memory
// mocks so the pipeline runs without network access.

use anyhow::Result;
use async_trait::async_trait;

use super::notifications::Notification;
use super::social::{ProfileEntry, ProfileTab};

#[async_trait]
pub trait DeezerApi: Send + Sync {
    /// List the bot account's notifications, read and unread.
    async fn notifications(&self) -> Result<Vec<Notification>>;

    /// Mark a notification as read. At-most-once processing hinges on this
    /// call happening before any heavy work.
    async fn mark_read(&self, notification_id: u64) -> Result<()>;

    /// List one tab of the bot's own profile as a full, unpaged listing.
    async fn profile_page(&self, tab: ProfileTab) -> Result<Vec<ProfileEntry>>;

    /// Follow a user. Re-following an already-followed user is a remote
    /// no-op.
    async fn follow(&self, user_id: u64) -> Result<()>;
}
