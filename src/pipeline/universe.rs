use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    info,
    pipeline::{Step, harvest::fetch_artist_details, pause},
    spotify::{MAX_ARTIST_IDS, SpotifyApi, SpotifyError},
    types::{Artist, Source, Track},
};

/// Every artist the listener already knows, keyed by id.
///
/// An id is stored once. Rediscovering an artist only adds a source, the
/// first stored record keeps its other fields. Serialized as a flat array of
/// artists in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Artist>", into = "Vec<Artist>")]
pub struct ArtistUniverse {
    artists: Vec<Artist>,
    index: HashMap<String, usize>,
}

impl ArtistUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the universe from the three discovery categories.
    ///
    /// Playlist artists seed the universe, then the artists referenced by top
    /// tracks are tagged or added, then the top artists. A top-track artist not
    /// seen before is added from `track_artist_details` (or the top artists) so
    /// it carries genres; without a detail record the bare reference is used.
    pub fn merge(
        top_tracks: &[Track],
        top_artists: &[Artist],
        playlist_artists: &[Artist],
        track_artist_details: &[Artist],
    ) -> Self {
        let mut universe = Self::new();

        for artist in playlist_artists {
            universe.add(artist.clone(), Source::Playlists);
        }

        let mut details: HashMap<&str, &Artist> = HashMap::new();
        for artist in track_artist_details.iter().chain(top_artists) {
            details.entry(artist.id.as_str()).or_insert(artist);
        }

        for track in top_tracks {
            for reference in &track.artists {
                let Some(id) = reference.id.as_deref() else {
                    continue;
                };
                if universe.tag(id, Source::TopTracks) {
                    continue;
                }

                let artist = match details.get(id) {
                    Some(detail) => (*detail).clone(),
                    None => {
                        info!(
                            "No detail record for artist {}, keeping the reference",
                            reference.name
                        );
                        Artist {
                            id: id.to_string(),
                            name: reference.name.clone(),
                            genres: Vec::new(),
                            sources: Default::default(),
                        }
                    }
                };
                universe.add(artist, Source::TopTracks);
            }
        }

        for artist in top_artists {
            universe.add(artist.clone(), Source::TopArtists);
        }

        universe
    }

    /// Adds an artist discovered through `source`. Returns `false` when the id
    /// was already present, in which case only the source is recorded.
    pub fn add(&mut self, mut artist: Artist, source: Source) -> bool {
        if self.tag(&artist.id, source) {
            return false;
        }

        artist.sources.insert(source);
        self.index.insert(artist.id.clone(), self.artists.len());
        self.artists.push(artist);
        true
    }

    /// Records `source` on a known artist. Returns `false` for unknown ids.
    pub fn tag(&mut self, id: &str, source: Source) -> bool {
        match self.index.get(id) {
            Some(&position) => {
                self.artists[position].sources.insert(source);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Artist> {
        self.index.get(id).map(|&position| &self.artists[position])
    }

    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    pub fn ids(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.artists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }
}

impl From<Vec<Artist>> for ArtistUniverse {
    fn from(artists: Vec<Artist>) -> Self {
        let mut universe = Self::new();
        for artist in artists {
            match universe.index.get(&artist.id) {
                Some(&position) => universe.artists[position]
                    .sources
                    .extend(artist.sources.iter().copied()),
                None => {
                    universe
                        .index
                        .insert(artist.id.clone(), universe.artists.len());
                    universe.artists.push(artist);
                }
            }
        }
        universe
    }
}

impl From<ArtistUniverse> for Vec<Artist> {
    fn from(universe: ArtistUniverse) -> Self {
        universe.artists
    }
}

/// Ids referenced by top tracks with neither a playlist artist nor a top
/// artist record, deduplicated in order of first appearance.
pub fn missing_track_artist_ids(
    top_tracks: &[Track],
    top_artists: &[Artist],
    playlist_artists: &[Artist],
) -> Vec<String> {
    let mut known: HashSet<&str> = playlist_artists
        .iter()
        .chain(top_artists)
        .map(|a| a.id.as_str())
        .collect();

    let mut missing = Vec::new();
    for id in top_tracks.iter().flat_map(|t| t.artist_ids()) {
        if known.insert(id) {
            missing.push(id.to_string());
        }
    }
    missing
}

/// Progress of resolving artist ids into full records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveCheckpoint {
    pub ids_left: Vec<String>,
    pub resolved: Vec<Artist>,
}

impl ResolveCheckpoint {
    pub fn start(ids: Vec<String>) -> Self {
        Self {
            ids_left: ids,
            resolved: Vec::new(),
        }
    }
}

/// Fetches full records for `ids` in batches, suspending on interruptible
/// faults with the batches not requested yet.
pub async fn resolve_artists<A>(
    api: &A,
    ids: Vec<String>,
    delay: Duration,
    resume: Option<ResolveCheckpoint>,
) -> Result<Step<Vec<Artist>, ResolveCheckpoint>, SpotifyError>
where
    A: SpotifyApi + ?Sized,
{
    let mut state = resume.unwrap_or_else(|| ResolveCheckpoint::start(ids));

    while !state.ids_left.is_empty() {
        let batch_len = state.ids_left.len().min(MAX_ARTIST_IDS);
        pause(delay).await;

        match fetch_artist_details(api, &state.ids_left[..batch_len]).await {
            Ok(artists) => {
                state.resolved.extend(artists);
                state.ids_left.drain(..batch_len);
            }
            Err(e) if e.is_interruptible() => {
                return Ok(Step::Interrupted {
                    checkpoint: state,
                    cause: e,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Step::Complete(state.resolved))
}
