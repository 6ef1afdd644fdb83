// Social-graph calls — profile page listings and follow-back.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::client::DeezerClient;

/// Which tab of a profile page to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTab {
    Followers,
    Following,
}

impl ProfileTab {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileTab::Followers => "followers",
            ProfileTab::Following => "following",
        }
    }
}

/// A simplified profile entry — just the fields the bot needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEntry {
    #[serde(rename = "USER_ID")]
    pub user_id: u64,
    #[serde(rename = "BLOG_NAME", default)]
    pub name: String,
}

/// The gw API pages profile tabs, but a single oversized request covers any
/// realistic bot account.
const PROFILE_PAGE_SIZE: u32 = 10_000;

impl DeezerClient {
    /// List one tab (followers or following) of the bot's own profile as a
    /// full, unpaged listing.
    pub async fn profile_page(&self, tab: ProfileTab) -> Result<Vec<ProfileEntry>> {
        let payload = json!({
            "USER_ID": self.user_id(),
            "tab": tab.as_str(),
            "nb": PROFILE_PAGE_SIZE,
        });

        let mut results: PageProfileResults = self
            .call("deezer.pageProfile", Some(payload))
            .await
            .with_context(|| format!("Failed to list {} page", tab.as_str()))?;

        let entries = results
            .tab
            .remove(tab.as_str())
            .map(|t| t.data)
            .unwrap_or_default();

        debug!(tab = tab.as_str(), count = entries.len(), "Fetched profile page");
        Ok(entries)
    }

    /// Follow a user. Re-following an already-followed user is a no-op at
    /// the service.
    pub async fn follow(&self, user_id: u64) -> Result<()> {
        let payload = json!({
            "friend_id": user_id,
            "ctxt": { "id": user_id, "t": "profile_page" },
        });

        let _ack: serde_json::Value = self
            .call("friend.follow", Some(payload))
            .await
            .with_context(|| format!("Failed to follow user {user_id}"))?;
        Ok(())
    }
}

// -- Serde types for deezer.pageProfile --

#[derive(Deserialize)]
struct PageProfileResults {
    #[serde(rename = "TAB", default)]
    tab: HashMap<String, TabData>,
}

#[derive(Deserialize)]
struct TabData {
    #[serde(default)]
    data: Vec<ProfileEntry>,
}
