//! # CLI Module
//!
//! User-facing commands. Each command loads what it needs from the local data
//! directory, drives the pipeline and reports through the logging macros.
//!
//! ```text
//! CLI Layer (User Interface)
//!     ↓
//! Pipeline (collection stages, sampler)
//!     ↓
//! Management Layer (token, state and caches on disk)
//!     ↓
//! Spotify Layer (SpotifyApi, SpotifyClient)
//! ```
//!
//! ## Commands
//!
//! - [`collect`] - Collects the artist universe, resuming an interrupted run
//! - [`playlist`] - Samples never-heard tracks and publishes them as a playlist
//! - [`list_artists`] - Shows the cached artist universe
//! - [`status`] - Shows the progress of the collection and the caches
//!
//! ## Usage
//!
//! ```bash
//! truedisc collect                   # build or resume the artist universe
//! truedisc playlist --dry-run        # sample without creating a playlist
//! truedisc playlist --length 50      # publish a shorter playlist
//! truedisc artists --source playlists
//! truedisc status
//! ```
//!
//! Fatal errors end the process through the `error!` macro; the collection
//! state stays on disk so the next `collect` picks up where this one stopped.

mod artists;
mod collect;
mod playlist;
mod status;

pub use artists::list_artists;
pub use collect::collect;
pub use playlist::{PlaylistArgs, playlist};
pub use status::status;

use crate::{
    error,
    management::TokenManager,
    spotify::{SpotifyApi, SpotifyClient},
};

/// Builds a client from the stored credential and checks it against the API.
async fn authorized_client() -> SpotifyClient {
    let token_mgr = match TokenManager::load().await {
        Ok(t) => t,
        Err(e) => error!("Failed to load token. Err: {}", e),
    };

    let client = SpotifyClient::new(token_mgr);
    match client.is_valid().await {
        Ok(true) => client,
        Ok(false) => error!("Access token rejected by Spotify. Store a fresh token and retry."),
        Err(e) => error!("Cannot reach Spotify. Err: {}", e),
    }
}
