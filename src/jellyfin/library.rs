// Path → item-id index over the media server's music libraries.
//
// Built lazily, once per user per processing pass: every audio item under
// every music-collection root, keyed by lowercased absolute path. The remote
// library is the source of truth; this cache has a staleness window of one
// pass. A file downloaded after the build is invisible until the next pass
// or an explicit `invalidate` — that miss is expected and non-fatal.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::traits::JellyfinApi;

/// Per-pass cache mapping `lowercase(absolute_path)` → library item id,
/// one mapping per user.
#[derive(Default)]
pub struct LibraryIndex {
    by_user: HashMap<String, HashMap<String, String>>,
}

impl LibraryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an absolute file path to a library item id for the given
    /// user. Case-insensitive exact match; `Ok(None)` on a miss.
    ///
    /// The first call for a user fetches and caches that user's whole audio
    /// library; later calls reuse the mapping without re-querying, even if
    /// the remote library has changed since.
    pub async fn resolve(
        &mut self,
        api: &dyn JellyfinApi,
        user_id: &str,
        path: &str,
    ) -> Result<Option<String>> {
        if !self.by_user.contains_key(user_id) {
            let mapping = build_mapping(api, user_id).await?;
            self.by_user.insert(user_id.to_string(), mapping);
        }

        Ok(self.by_user[user_id].get(&path.to_lowercase()).cloned())
    }

    /// Drop a user's cached mapping so the next resolve rebuilds it.
    pub fn invalidate(&mut self, user_id: &str) {
        self.by_user.remove(user_id);
    }
}

async fn build_mapping(
    api: &dyn JellyfinApi,
    user_id: &str,
) -> Result<HashMap<String, String>> {
    let folders = api
        .media_folders()
        .await
        .context("Failed to list media folders")?;

    let music_roots: Vec<_> = folders
        .into_iter()
        .filter(|f| f.collection_type.as_deref() == Some("music"))
        .collect();

    if music_roots.is_empty() {
        warn!("No music libraries found on the media server");
    }

    let mut mapping = HashMap::new();
    for root in &music_roots {
        let items = api
            .audio_items(&root.id, user_id)
            .await
            .with_context(|| format!("Failed to list audio items under '{}'", root.name))?;

        for item in items {
            if let Some(path) = item.path {
                mapping.insert(path.to_lowercase(), item.id);
            }
        }
    }

    info!(user = user_id, entries = mapping.len(), "Built library path index");
    Ok(mapping)
}
