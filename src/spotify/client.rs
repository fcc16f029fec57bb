use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    config,
    management::TokenManager,
    spotify::{Category, SpotifyApi, SpotifyError},
    types::{
        AddTrackToPlaylistRequest, AddTrackToPlaylistResponse, CreatePlaylistRequest,
        CreatePlaylistResponse, CurrentUser, Paging, RecommendationsResponse,
        SeveralArtistsResponse, TimeRange,
    },
};

/// reqwest backed implementation of [`SpotifyApi`].
///
/// Each request asks the token manager for a valid bearer token first, so an
/// expired token is refreshed transparently between pipeline steps. No call
/// is retried here; retry policy belongs to the collection driver.
pub struct SpotifyClient {
    http: Client,
    base_url: String,
    tokens: Mutex<TokenManager>,
}

impl SpotifyClient {
    pub fn new(token_mgr: TokenManager) -> Self {
        Self::with_base_url(token_mgr, config::spotify_apiurl())
    }

    pub fn with_base_url(token_mgr: TokenManager, base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: Mutex::new(token_mgr),
        }
    }

    async fn get(&self, path: &str) -> RequestBuilder {
        let token = self.tokens.lock().await.get_valid_token().await;
        self.http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
    }

    async fn post(&self, path: &str) -> RequestBuilder {
        let token = self.tokens.lock().await.get_valid_token().await;
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SpotifyError> {
        let response = check_status(request.send().await?).await?;
        let text = response.text().await?;
        serde_json::from_str::<T>(&text).map_err(|e| SpotifyError::Decode(e.to_string()))
    }
}

/// Maps a response onto the interruptible/fatal fault classes.
async fn check_status(response: Response) -> Result<Response, SpotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(SpotifyError::TokenInvalid);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(SpotifyError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_default();
    Err(SpotifyError::Status { status, body })
}

#[async_trait]
impl SpotifyApi for SpotifyClient {
    async fn items_page(
        &self,
        category: Category,
        limit: u32,
        offset: u32,
        time_range: Option<TimeRange>,
    ) -> Result<Vec<Value>, SpotifyError> {
        let path = match (category, time_range) {
            (Category::Playlists, _) => {
                format!("/me/playlists?limit={limit}&offset={offset}")
            }
            (_, Some(range)) => format!(
                "/me/top/{category}?limit={limit}&offset={offset}&time_range={range}",
                category = category.as_str(),
                range = range.as_str()
            ),
            (_, None) => format!(
                "/me/top/{category}?limit={limit}&offset={offset}",
                category = category.as_str()
            ),
        };

        let page: Paging<Value> = Self::send_json(self.get(&path).await).await?;
        Ok(page.items)
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Value>, SpotifyError> {
        let path = format!("/playlists/{playlist_id}/tracks?limit={limit}&offset={offset}");
        let page: Paging<Value> = Self::send_json(self.get(&path).await).await?;
        Ok(page.items)
    }

    async fn artists(&self, ids: &[String]) -> Result<Vec<Value>, SpotifyError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!("/artists?ids={}", ids.join(","));
        let res: SeveralArtistsResponse = Self::send_json(self.get(&path).await).await?;
        // unknown ids come back as null entries
        Ok(res.artists.into_iter().filter(|a| !a.is_null()).collect())
    }

    async fn recommendations(
        &self,
        genre: &str,
        artist_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, SpotifyError> {
        let limit = limit.to_string();
        let request = self.get("/recommendations").await.query(&[
            ("seed_artists", artist_id),
            ("seed_genres", genre),
            ("limit", limit.as_str()),
        ]);
        let res: RecommendationsResponse = Self::send_json(request).await?;
        Ok(res.tracks)
    }

    async fn current_user(&self) -> Result<CurrentUser, SpotifyError> {
        Self::send_json(self.get("/me").await).await
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatePlaylistResponse, SpotifyError> {
        let path = format!("/users/{user_id}/playlists");
        Self::send_json(self.post(&path).await.json(request)).await
    }

    async fn add_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<String, SpotifyError> {
        let path = format!("/playlists/{playlist_id}/tracks");
        let body = AddTrackToPlaylistRequest {
            uris: uris.to_vec(),
        };
        let res: AddTrackToPlaylistResponse =
            Self::send_json(self.post(&path).await.json(&body)).await?;
        Ok(res.snapshot_id)
    }
}
