//! # Spotify Integration Module
//!
//! The seam between the discovery pipeline and the Spotify Web API. Every
//! remote call the pipeline makes goes through the [`SpotifyApi`] trait, so the
//! collection and sampling logic never touches HTTP directly and can be driven
//! by an in-memory fake in tests.
//!
//! ```text
//! Pipeline (fetch, harvest, collector, sampler)
//!          ↓
//! SpotifyApi trait
//!          ↓
//! SpotifyClient (reqwest, bearer token from TokenManager)
//!          ↓
//! Spotify Web API
//! ```
//!
//! ## Fault classes
//!
//! Responses are classified into two groups by [`SpotifyError::is_interruptible`]:
//!
//! - **Interruptible**: `401 Unauthorized` and `429 Too Many Requests`. The
//!   pipeline captures its progress and the caller resumes later.
//! - **Fatal**: any other non-2xx status, transport failures and envelopes that
//!   cannot be decoded. These indicate a misconfiguration or a contract change
//!   and are never retried.
//!
//! ## Item decoding
//!
//! Paged endpoints hand back raw JSON items. Each item is decoded on its own by
//! the caller so that a single malformed record is skipped instead of failing
//! the whole page.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::types::{CreatePlaylistRequest, CreatePlaylistResponse, CurrentUser, TimeRange};

pub mod auth;
pub mod client;
pub mod playlist;

pub use client::SpotifyClient;

/// Largest id list accepted by `GET /artists`.
pub const MAX_ARTIST_IDS: usize = 50;
/// Largest uri list accepted by `POST /playlists/{id}/tracks`.
pub const MAX_PLAYLIST_URIS: usize = 100;
/// Page size used when walking the tracks of a playlist.
pub const PLAYLIST_TRACKS_PAGE: u32 = 100;

#[derive(Debug, Error)]
pub enum SpotifyError {
    /// The bearer token was rejected (HTTP 401).
    #[error("access token rejected by Spotify")]
    TokenInvalid,
    /// The per-credential rate limit was hit (HTTP 429).
    #[error("rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    /// Any other non-2xx response.
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// Network or client failure before a response was received.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response envelope did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl SpotifyError {
    pub fn is_interruptible(&self) -> bool {
        matches!(
            self,
            SpotifyError::TokenInvalid | SpotifyError::RateLimited { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SpotifyError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!(", retry after {}s", wait.as_secs()),
        None => String::new(),
    }
}

/// The three item categories the listener's universe is harvested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Tracks,
    Artists,
    Playlists,
}

impl Category {
    /// Whether pages of this category are segmented by time range.
    pub fn has_time_ranges(&self) -> bool {
        !matches!(self, Category::Playlists)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tracks => "tracks",
            Category::Artists => "artists",
            Category::Playlists => "playlists",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every remote operation the discovery pipeline depends on.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// One page of the listener's top tracks/artists or of their playlists.
    /// `time_range` is ignored for [`Category::Playlists`].
    async fn items_page(
        &self,
        category: Category,
        limit: u32,
        offset: u32,
        time_range: Option<TimeRange>,
    ) -> Result<Vec<Value>, SpotifyError>;

    /// One page of playlist items, each shaped like `{"track": {...} | null}`.
    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Value>, SpotifyError>;

    /// Full artist records for at most [`MAX_ARTIST_IDS`] ids.
    async fn artists(&self, ids: &[String]) -> Result<Vec<Value>, SpotifyError>;

    /// Tracks recommended for a genre and an artist seed.
    async fn recommendations(
        &self,
        genre: &str,
        artist_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, SpotifyError>;

    async fn current_user(&self) -> Result<CurrentUser, SpotifyError>;

    async fn create_playlist(
        &self,
        user_id: &str,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatePlaylistResponse, SpotifyError>;

    /// Adds at most [`MAX_PLAYLIST_URIS`] uris, returns the snapshot id.
    async fn add_tracks(&self, playlist_id: &str, uris: &[String])
    -> Result<String, SpotifyError>;

    /// Probes the credential. A rejected token is `Ok(false)`, any other
    /// failure is propagated.
    async fn is_valid(&self) -> Result<bool, SpotifyError> {
        match self.current_user().await {
            Ok(_) => Ok(true),
            Err(SpotifyError::TokenInvalid) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
