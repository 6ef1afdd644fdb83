// Notification ingestion — the front of the download pipeline.
//
// Unread notifications become download requests. Each source notification
// is marked read immediately, before any heavy work: a crash mid-download
// consumes the share rather than retrying it (at-most-once by design).

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::deezer::notifications::ShareKind;
use crate::deezer::traits::DeezerApi;

/// One share to download, derived 1:1 from an unread notification.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub notification_id: u64,
    /// Absolute share URL the engine can open.
    pub share_url: String,
    pub kind: ShareKind,
    /// Sender display name; doubles as the media-server username and the
    /// per-sender directory name.
    pub sender: String,
}

/// Poll for unread notifications and turn them into download requests.
///
/// Every unread notification is consumed (marked read) here, whether or
/// not it yields a request — unknown share kinds and shares without a
/// readable sender are logged and dropped after the mark.
pub async fn poll(api: &dyn DeezerApi, share_base_url: &str) -> Result<Vec<DownloadRequest>> {
    let notifications = api
        .notifications()
        .await
        .context("Failed to poll notifications")?;

    let unread: Vec<_> = notifications.into_iter().filter(|n| !n.read).collect();
    if unread.is_empty() {
        debug!("No unread notifications");
        return Ok(Vec::new());
    }

    info!(count = unread.len(), "Unread notifications to process");

    let mut requests = Vec::new();
    for notification in unread {
        // Consume the notification first. If the mark fails, the share is
        // still unread remotely and will come back on the next poll, so
        // defer it now rather than risk processing it twice. A dead session
        // is the one exception: nothing later in the pass can work either.
        if let Err(e) = api.mark_read(notification.id).await {
            if crate::deezer::client::is_auth_error(&e) {
                return Err(e);
            }
            warn!(
                id = notification.id,
                "Failed to mark notification read, deferring to next poll: {e:#}"
            );
            continue;
        }

        let kind = ShareKind::from_share_path(&notification.url);
        if kind == ShareKind::Unknown {
            warn!(
                id = notification.id,
                url = %notification.url,
                "Dropping share with unknown content kind"
            );
            continue;
        }

        let Some(sender) = notification.sender_name() else {
            warn!(
                id = notification.id,
                title = %notification.title,
                "Dropping share without a readable sender"
            );
            continue;
        };

        debug!(
            id = notification.id,
            kind = %kind,
            sender = %sender,
            "Parsed share notification"
        );

        requests.push(DownloadRequest {
            notification_id: notification.id,
            share_url: format!(
                "{}{}",
                share_base_url.trim_end_matches('/'),
                notification.url
            ),
            kind,
            sender,
        });
    }

    Ok(requests)
}
