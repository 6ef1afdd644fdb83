// Follower reconciliation — follow back anyone who follows the bot.
//
// Both listings are refetched in full every pass; nothing is cached across
// passes. The relationship is monotonic: there is no unfollow logic.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::deezer::social::ProfileTab;
use crate::deezer::traits::DeezerApi;

/// Follow every follower the bot is not yet following. Returns the number
/// of successful follow calls.
pub async fn reconcile(api: &dyn DeezerApi) -> Result<usize> {
    let followers = api
        .profile_page(ProfileTab::Followers)
        .await
        .context("Failed to list followers")?;
    let following = api
        .profile_page(ProfileTab::Following)
        .await
        .context("Failed to list following")?;

    let following_ids: HashSet<u64> = following.iter().map(|p| p.user_id).collect();

    // Set semantics on both sides: a follower appearing twice in the
    // listing is still followed at most once.
    let mut seen = HashSet::new();
    let pending: Vec<u64> = followers
        .iter()
        .map(|p| p.user_id)
        .filter(|id| !following_ids.contains(id) && seen.insert(*id))
        .collect();

    if pending.is_empty() {
        debug!(followers = followers.len(), "Everyone is already followed back");
        return Ok(0);
    }

    info!(count = pending.len(), "Following back new followers");

    let mut followed = 0;
    for user_id in pending {
        match api.follow(user_id).await {
            Ok(()) => {
                info!(user_id = user_id, "Followed back");
                followed += 1;
            }
            Err(e) if crate::deezer::client::is_auth_error(&e) => return Err(e),
            Err(e) => {
                warn!(user_id = user_id, "Follow failed, continuing with the rest: {e:#}");
            }
        }
    }

    Ok(followed)
}
