use std::path::PathBuf;

use crate::{config, pipeline::ArtistUniverse, types::Track};

/// The finished artist universe, cached between `collect` and `playlist`.
pub struct ArtistUniverseManager {
    universe: ArtistUniverse,
}

impl ArtistUniverseManager {
    pub fn new(universe: ArtistUniverse) -> Self {
        Self { universe }
    }

    pub async fn load() -> Result<Self, String> {
        Self::load_from(&Self::cache_path()).await
    }

    pub async fn load_from(path: &PathBuf) -> Result<Self, String> {
        let content = async_fs::read_to_string(path)
            .await
            .map_err(|e| e.to_string())?;
        let universe: ArtistUniverse =
            serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(Self { universe })
    }

    pub async fn persist(&self) -> Result<(), String> {
        self.persist_to(&Self::cache_path()).await
    }

    pub async fn persist_to(&self, path: &PathBuf) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(&self.universe).map_err(|e| e.to_string())?;
        async_fs::write(path, json)
            .await
            .map_err(|e| e.to_string())
    }

    pub fn universe(&self) -> &ArtistUniverse {
        &self.universe
    }

    pub fn count_artists(&self) -> usize {
        self.universe.len()
    }

    fn cache_path() -> PathBuf {
        let mut path = config::data_dir();
        path.push("cache/artists.json");
        path
    }
}

/// The last sampled track list.
pub struct TrackListManager {
    tracks: Vec<Track>,
}

impl TrackListManager {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub async fn load() -> Result<Self, String> {
        let content = async_fs::read_to_string(Self::cache_path())
            .await
            .map_err(|e| e.to_string())?;
        let tracks: Vec<Track> = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(Self { tracks })
    }

    pub async fn persist(&self) -> Result<(), String> {
        let path = Self::cache_path();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(&self.tracks).map_err(|e| e.to_string())?;
        async_fs::write(path, json)
            .await
            .map_err(|e| e.to_string())
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn cache_path() -> PathBuf {
        let mut path = config::data_dir();
        path.push("cache/track_list.json");
        path
    }
}
