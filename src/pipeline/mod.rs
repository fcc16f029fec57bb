//! # Discovery Pipeline
//!
//! The resumable collection of the listener's artist universe and the
//! recommendation sampler that consumes it.
//!
//! ```text
//! Collector (stage machine)
//!     ├── fetch    top tracks, top artists, playlists   (paged, per time range)
//!     ├── harvest  playlists → artists
//!     ├── universe resolve missing top-track artists, merge all sources
//!     ↓
//! ArtistUniverse ──→ sampler ──→ Track list
//! ```
//!
//! Every remote call is awaited in sequence and preceded by a configurable
//! pause, so a single pipeline never has more than one request in flight
//! against the credential's rate limit.
//!
//! Steps that can be interrupted return [`Step`]: either the finished value or
//! a checkpoint from which the very same step continues later. Checkpoints are
//! plain serde data so they survive a process restart.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;

use crate::{spotify::SpotifyError, warning};

pub mod collector;
pub mod fetch;
pub mod harvest;
pub mod sampler;
pub mod universe;

pub use collector::{
    Advance, Checkpoint, CollectionError, CollectionState, Collector, CollectorOptions, RetryPolicy, Stage,
    collect,
};
pub use fetch::{FetchCheckpoint, FetchOptions, fetch_items};
pub use harvest::{HarvestCheckpoint, HarvestOptions, harvest_playlist_artists};
pub use sampler::{GenreIndex, Rejection, SampleOptions, Seed, TrackFilter, sample};
pub use universe::{ArtistUniverse, ResolveCheckpoint, missing_track_artist_ids, resolve_artists};

/// Outcome of a step that may be suspended by an interruptible fault.
#[derive(Debug)]
pub enum Step<T, C> {
    Complete(T),
    Interrupted { checkpoint: C, cause: SpotifyError },
}

impl<T, C> Step<T, C> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Step::Complete(_))
    }

    pub fn complete(self) -> Option<T> {
        match self {
            Step::Complete(value) => Some(value),
            Step::Interrupted { .. } => None,
        }
    }

    pub fn checkpoint(self) -> Option<C> {
        match self {
            Step::Complete(_) => None,
            Step::Interrupted { checkpoint, .. } => Some(checkpoint),
        }
    }
}

/// Rate limit pause in front of every remote request.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

/// Decodes raw items one by one, logging and skipping the malformed ones.
pub(crate) fn decode_items<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warning!("Skipping malformed {}: {}", what, e);
                None
            }
        })
        .collect()
}
