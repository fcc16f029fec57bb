use crate::{
    config, error, info,
    management::{ArtistUniverseManager, CollectionStateManager},
    pipeline::{self, Collector, CollectorOptions, RetryPolicy},
    success, warning,
};

use super::authorized_client;

/// Collects the artist universe and caches it.
///
/// An interrupted run left on disk is resumed unless `fresh` is set. The
/// collection state is removed once the universe has been cached.
pub async fn collect(fresh: bool, max_retries: Option<u32>) {
    let client = authorized_client().await;
    let store = CollectionStateManager::new();

    let previous = if fresh {
        None
    } else {
        match store.load().await {
            Ok(state) => state,
            Err(e) => error!(
                "Cannot read collection state at {}. Run with --fresh to start over. Err: {}",
                store.path().display(),
                e
            ),
        }
    };

    let options = CollectorOptions::with_delay(config::request_delay());
    let (mut collector, resume) = match previous {
        Some(state) => {
            info!("Resuming collection after stage {}.", state.stage);
            (Collector::with_state(&client, options, state), true)
        }
        None => (Collector::new(&client, options), false),
    };
    collector = collector.persist_to(&store);

    let policy = RetryPolicy {
        max_retries: max_retries.unwrap_or_else(config::max_retries),
        retry_delay: config::retry_delay(),
    };

    let universe = match pipeline::collect(&mut collector, resume, &policy).await {
        Ok(universe) => universe,
        Err(e) => error!(
            "Data collection stopped: {}. Progress is kept in {}.",
            e,
            store.path().display()
        ),
    };

    let artist_mgr = ArtistUniverseManager::new(universe);
    if let Err(e) = artist_mgr.persist().await {
        error!("Failed to cache artists. Err: {}", e);
    }
    success!("Cached {} listened artists.", artist_mgr.count_artists());

    if let Err(e) = store.clear().await {
        warning!("Cannot remove collection state. Err: {}", e);
    }
}
