#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use truedisc::{
    spotify::{Category, SpotifyApi, SpotifyError},
    types::{CreatePlaylistRequest, CreatePlaylistResponse, CurrentUser, TimeRange},
};

/// Every request the fake received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Items {
        category: &'static str,
        limit: u32,
        offset: u32,
        time_range: Option<TimeRange>,
    },
    PlaylistTracks {
        playlist_id: String,
        offset: u32,
    },
    Artists(Vec<String>),
    Recommendations {
        genre: String,
        artist_id: String,
    },
    CurrentUser,
    CreatePlaylist(CreatePlaylistRequest),
    AddTracks(Vec<String>),
}

/// Failure injected on a given request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    Unauthorized,
    RateLimited(u64),
    Server,
}

impl Fault {
    fn error(self) -> SpotifyError {
        match self {
            Fault::Unauthorized => SpotifyError::TokenInvalid,
            Fault::RateLimited(secs) => SpotifyError::RateLimited {
                retry_after: Some(Duration::from_secs(secs)),
            },
            Fault::Server => SpotifyError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".to_string(),
            },
        }
    }
}

/// In-memory Spotify with scripted data and scripted failures.
#[derive(Default)]
pub struct FakeSpotify {
    items: HashMap<(&'static str, Option<TimeRange>), Vec<Value>>,
    playlist_tracks: HashMap<String, Vec<Value>>,
    artists: HashMap<String, Value>,
    recommendations: HashMap<String, Vec<Value>>,
    faults: Mutex<HashMap<usize, Fault>>,
    fail_always: Mutex<Option<Fault>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items listed for a category and time range; playlists use `None`.
    pub fn with_items(
        mut self,
        category: Category,
        time_range: Option<TimeRange>,
        items: Vec<Value>,
    ) -> Self {
        self.items.insert((category.as_str(), time_range), items);
        self
    }

    pub fn with_playlist_tracks(mut self, playlist_id: &str, items: Vec<Value>) -> Self {
        self.playlist_tracks.insert(playlist_id.to_string(), items);
        self
    }

    pub fn with_artist(mut self, artist: Value) -> Self {
        let id = artist["id"].as_str().unwrap_or_default().to_string();
        self.artists.insert(id, artist);
        self
    }

    /// Tracks recommended whenever `artist_id` is the seed.
    pub fn with_recommendations(mut self, artist_id: &str, tracks: Vec<Value>) -> Self {
        self.recommendations.insert(artist_id.to_string(), tracks);
        self
    }

    /// Fails the `n`-th request (1-based, counted over the whole fake).
    pub fn fail_on(&self, n: usize, fault: Fault) {
        self.faults.lock().unwrap().insert(n, fault);
    }

    pub fn fail_always(&self, fault: Option<Fault>) {
        *self.fail_always.lock().unwrap() = fault;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.faults.lock().unwrap().clear();
        self.calls.lock().unwrap().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: Call) -> Result<(), SpotifyError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        let n = calls.len();

        if let Some(fault) = *self.fail_always.lock().unwrap() {
            return Err(fault.error());
        }
        match self.faults.lock().unwrap().remove(&n) {
            Some(fault) => Err(fault.error()),
            None => Ok(()),
        }
    }
}

fn page(items: &[Value], limit: u32, offset: u32) -> Vec<Value> {
    items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn items_page(
        &self,
        category: Category,
        limit: u32,
        offset: u32,
        time_range: Option<TimeRange>,
    ) -> Result<Vec<Value>, SpotifyError> {
        self.record(Call::Items {
            category: category.as_str(),
            limit,
            offset,
            time_range,
        })?;
        let key = (category.as_str(), time_range);
        Ok(self
            .items
            .get(&key)
            .map(|items| page(items, limit, offset))
            .unwrap_or_default())
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Value>, SpotifyError> {
        self.record(Call::PlaylistTracks {
            playlist_id: playlist_id.to_string(),
            offset,
        })?;
        Ok(self
            .playlist_tracks
            .get(playlist_id)
            .map(|items| page(items, limit, offset))
            .unwrap_or_default())
    }

    async fn artists(&self, ids: &[String]) -> Result<Vec<Value>, SpotifyError> {
        self.record(Call::Artists(ids.to_vec()))?;
        Ok(ids
            .iter()
            .filter_map(|id| self.artists.get(id).cloned())
            .collect())
    }

    async fn recommendations(
        &self,
        genre: &str,
        artist_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, SpotifyError> {
        self.record(Call::Recommendations {
            genre: genre.to_string(),
            artist_id: artist_id.to_string(),
        })?;
        Ok(self
            .recommendations
            .get(artist_id)
            .map(|tracks| page(tracks, limit, 0))
            .unwrap_or_default())
    }

    async fn current_user(&self) -> Result<CurrentUser, SpotifyError> {
        self.record(Call::CurrentUser)?;
        Ok(CurrentUser {
            id: "listener".to_string(),
            display_name: Some("Listener".to_string()),
            href: None,
        })
    }

    async fn create_playlist(
        &self,
        _user_id: &str,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatePlaylistResponse, SpotifyError> {
        self.record(Call::CreatePlaylist(request.clone()))?;
        Ok(CreatePlaylistResponse {
            id: "pl-new".to_string(),
            name: request.name.clone(),
        })
    }

    async fn add_tracks(
        &self,
        _playlist_id: &str,
        uris: &[String],
    ) -> Result<String, SpotifyError> {
        self.record(Call::AddTracks(uris.to_vec()))?;
        Ok("snapshot-1".to_string())
    }
}

pub fn artist(id: &str, name: &str, genres: &[&str]) -> Value {
    json!({ "id": id, "name": name, "genres": genres })
}

pub fn track(id: &str, artist_ids: &[&str]) -> Value {
    let artists: Vec<Value> = artist_ids
        .iter()
        .map(|a| json!({ "id": a, "name": format!("Artist {}", a) }))
        .collect();
    json!({ "id": id, "name": format!("Track {}", id), "uri": format!("spotify:track:{}", id), "artists": artists })
}

pub fn playlist(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "tracks": { "href": null, "total": 0 } })
}

/// Playlist item wrapping a track.
pub fn item(track_id: &str, artist_ids: &[&str]) -> Value {
    json!({ "track": track(track_id, artist_ids) })
}

/// Playlist item of a local file: no track id, artist without id.
pub fn local_item(name: &str) -> Value {
    json!({ "track": { "id": null, "name": name, "artists": [{ "id": null, "name": "Local Artist" }] } })
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
