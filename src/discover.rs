//!
//! src/discover.rs  Andrew Belles  Oct 5th, 2025
//!
//! Work source for the playlist pass: browse categories, then each
//! category's playlists, on whichever identity the pool hands out
//!

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::backoff::FetchFailure;
use crate::credential::{Credential, CredentialPool};
use crate::fetch::SpotifyClient;
use crate::types::PlaylistItem;

/// Browse endpoints discovery needs; split out so it can be scripted
#[async_trait]
pub trait BrowseCatalog: Send + Sync {
    async fn categories(&self, credential: &Credential) ->
        Result<Vec<(String, String)>, FetchFailure>;

    async fn category_playlists(&self, credential: &Credential, category_id: &str) ->
        Result<Vec<String>, FetchFailure>;
}

#[async_trait]
impl BrowseCatalog for SpotifyClient {
    async fn categories(&self, credential: &Credential) ->
        Result<Vec<(String, String)>, FetchFailure> {
        SpotifyClient::categories(self, credential).await
    }

    async fn category_playlists(&self, credential: &Credential, category_id: &str) ->
        Result<Vec<String>, FetchFailure> {
        SpotifyClient::category_playlists(self, credential, category_id).await
    }
}

/// Deduplicated (playlist, category) items in first-seen order. A failed
/// category is skipped; a failed category listing yields no work.
pub async fn discover_playlists<B: BrowseCatalog + ?Sized>(
    browse: &B,
    pool: &CredentialPool,
    interval: Duration
) -> Vec<PlaylistItem> {
    let Some(credential) = pool.choose() else {
        warn!("discover.no_credentials");
        return Vec::new();
    };

    credential.gate().wait().await;
    let categories = match browse.categories(&credential).await {
        Ok(c) => c,
        Err(failure) => {
            warn!(credential = credential.label(), status = ?failure.status,
                error = %failure.message, "discover.categories.failed");
            return Vec::new();
        }
    };
    info!(categories = categories.len(), "discover.categories.done");

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for (i, (category_id, category_name)) in categories.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(interval).await;
        }
        let Some(credential) = pool.choose() else { break };
        credential.gate().wait().await;

        match browse.category_playlists(&credential, category_id).await {
            Ok(playlists) => {
                for playlist_id in playlists {
                    let item = PlaylistItem {
                        playlist_id,
                        category: Some(category_name.clone())
                    };
                    if seen.insert(item.clone()) {
                        items.push(item);
                    }
                }
            }
            Err(failure) => {
                warn!(credential = credential.label(), category = %category_id,
                    status = ?failure.status, error = %failure.message,
                    "discover.category.skipped");
            }
        }
    }

    info!(playlists = items.len(), "discover.done");
    items
}
