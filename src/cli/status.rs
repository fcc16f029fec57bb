use chrono::{Local, TimeZone};

use crate::{
    info,
    management::{ArtistUniverseManager, CollectionStateManager, TokenManager, TrackListManager},
    pipeline::Stage,
    success, warning,
};

/// Reports the stored credential, the collection progress and the caches.
pub async fn status() {
    match TokenManager::load().await {
        Ok(token_mgr) => {
            let token = token_mgr.current_token();
            let expires_at = Local
                .timestamp_opt((token.obtained_at + token.expires_in) as i64, 0)
                .single();
            match (token_mgr.is_expired(), expires_at) {
                (false, Some(at)) => info!("Access token valid until {}", at.format("%d/%m/%Y %H:%M")),
                _ => warning!("Access token expired or about to expire"),
            }
        }
        Err(e) => warning!("No access token. Err: {}", e),
    }

    let store = CollectionStateManager::new();
    match store.load().await {
        Ok(Some(state)) => {
            let next = state.in_progress().unwrap_or(Stage::Done);
            match &state.checkpoint {
                Some(cp) => info!(
                    "Collection interrupted during {} with {} items collected, run truedisc collect to resume",
                    next,
                    cp.collected()
                ),
                None => info!("Collection completed stage {}, next is {}", state.stage, next),
            }
        }
        Ok(None) => info!("No collection in progress"),
        Err(e) => warning!("Cannot read collection state. Err: {}", e),
    }

    match ArtistUniverseManager::load().await {
        Ok(mgr) => success!("{} listened artists cached", mgr.count_artists()),
        Err(_) => info!("No artists cached yet"),
    }

    if let Ok(mgr) = TrackListManager::load().await {
        info!("{} tracks in the last sampled list", mgr.tracks().len());
    }
}
