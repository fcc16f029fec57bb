use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt,
    time::Duration,
};

use rand::{Rng, seq::IndexedRandom};

use crate::{
    info,
    pipeline::{ArtistUniverse, decode_items, pause},
    spotify::{SpotifyApi, SpotifyError},
    types::{Source, Track},
    warning,
};

#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Sampling stops once the list holds more tracks than this.
    pub target_length: usize,
    /// Never seed with an artist known only from playlists.
    pub exclude_playlist_only: bool,
    pub rounds: u32,
    pub tracks_per_round: u32,
    /// Draws allowed per round before the round is skipped.
    pub max_seed_attempts: u32,
    pub delay: Duration,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            target_length: 100,
            exclude_playlist_only: false,
            rounds: 50,
            tracks_per_round: 5,
            max_seed_attempts: 100,
            delay: Duration::from_secs(5),
        }
    }
}

/// A seed candidate listed under one of its artist's genres.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub artist_id: String,
    pub artist_name: String,
    pub sources: BTreeSet<Source>,
}

impl Seed {
    pub fn is_playlist_only(&self) -> bool {
        self.sources.len() == 1 && self.sources.contains(&Source::Playlists)
    }
}

/// Genre → seed artists lookup, rebuilt before every sampling run.
#[derive(Debug, Clone, Default)]
pub struct GenreIndex {
    genres: Vec<(String, Vec<Seed>)>,
}

impl GenreIndex {
    pub fn build(universe: &ArtistUniverse) -> Self {
        let mut genres: BTreeMap<String, Vec<Seed>> = BTreeMap::new();
        for artist in universe.artists() {
            for genre in &artist.genres {
                genres.entry(genre.clone()).or_default().push(Seed {
                    artist_id: artist.id.clone(),
                    artist_name: artist.name.clone(),
                    sources: artist.sources.clone(),
                });
            }
        }

        Self {
            genres: genres.into_iter().collect(),
        }
    }

    /// Drops the genres in which every artist is known only from playlists.
    pub fn retain_eligible(&mut self) {
        self.genres
            .retain(|(_, seeds)| seeds.iter().any(|seed| !seed.is_playlist_only()));
    }

    pub fn len(&self) -> usize {
        self.genres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }

    pub fn seeds(&self, genre: &str) -> Option<&[Seed]> {
        self.genres
            .iter()
            .find(|(name, _)| name == genre)
            .map(|(_, seeds)| seeds.as_slice())
    }

    /// A uniformly drawn genre, then a uniformly drawn seed of that genre.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(&str, &Seed)> {
        let (genre, seeds) = self.genres.choose(rng)?;
        let seed = seeds.choose(rng)?;
        Some((genre.as_str(), seed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// An artist of the track is already in the generated list.
    ArtistReused,
    /// An artist of the track is part of the listener's universe.
    ArtistKnown,
    DuplicateTrack,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::ArtistReused => write!(f, "artist already in generated tracklist"),
            Rejection::ArtistKnown => write!(f, "artist already in list of listened artists"),
            Rejection::DuplicateTrack => write!(f, "track already in generated tracklist"),
        }
    }
}

/// Acceptance rules for recommended tracks.
pub struct TrackFilter {
    known_artists: HashSet<String>,
    used_artists: HashSet<String>,
    accepted_tracks: HashSet<String>,
}

impl TrackFilter {
    pub fn new(universe: &ArtistUniverse) -> Self {
        Self {
            known_artists: universe.ids(),
            used_artists: HashSet::new(),
            accepted_tracks: HashSet::new(),
        }
    }

    pub fn check(&self, track: &Track) -> Result<(), Rejection> {
        if track.artist_ids().any(|id| self.used_artists.contains(id)) {
            return Err(Rejection::ArtistReused);
        }
        if track.artist_ids().any(|id| self.known_artists.contains(id)) {
            return Err(Rejection::ArtistKnown);
        }
        if self.accepted_tracks.contains(&track.id) {
            return Err(Rejection::DuplicateTrack);
        }
        Ok(())
    }

    /// Checks the track and records its artists when it passes.
    pub fn admit(&mut self, track: &Track) -> Result<(), Rejection> {
        self.check(track)?;
        self.used_artists
            .extend(track.artist_ids().map(str::to_string));
        self.accepted_tracks.insert(track.id.clone());
        Ok(())
    }
}

/// Builds a list of tracks by artists the listener has never heard.
///
/// Each round draws a genre and one of its artists as recommendation seeds
/// and keeps the recommended tracks that pass the [`TrackFilter`]. Runs for at
/// most `rounds` rounds and stops early once the list is longer than
/// `target_length`. A short or empty list is a valid outcome.
///
/// A rejected token or a rate limit ends sampling early with the tracks
/// accepted so far; any other remote failure is returned as an error.
///
/// With `exclude_playlist_only`, genres without any eligible artist are
/// removed before sampling and a round gives up after `max_seed_attempts`
/// draws of playlist-only artists.
pub async fn sample<A, R>(
    api: &A,
    universe: &ArtistUniverse,
    options: &SampleOptions,
    rng: &mut R,
) -> Result<Vec<Track>, SpotifyError>
where
    A: SpotifyApi + ?Sized,
    R: Rng + ?Sized,
{
    let mut index = GenreIndex::build(universe);
    if options.exclude_playlist_only {
        index.retain_eligible();
    }

    info!("Number of music genres: {}", index.len());
    info!("Number of listened artists: {}", universe.len());

    let mut tracks: Vec<Track> = Vec::new();
    if index.is_empty() {
        warning!("No genre with an eligible seed artist, nothing to sample.");
        return Ok(tracks);
    }

    let mut filter = TrackFilter::new(universe);

    for round in 0..options.rounds {
        if round > 0 {
            pause(options.delay).await;
        }

        let Some((genre, artist_id)) = draw_seed(&index, options, rng) else {
            warning!(
                "No eligible seed after {} draws, skipping round {}",
                options.max_seed_attempts,
                round + 1
            );
            continue;
        };

        let candidates = match api
            .recommendations(&genre, &artist_id, options.tracks_per_round)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) if e.is_interruptible() => {
                warning!(
                    "Recommendations stopped after round {} ({}), keeping {} tracks",
                    round + 1,
                    e,
                    tracks.len()
                );
                break;
            }
            Err(e) => return Err(e),
        };

        for track in decode_items::<Track>(candidates, "recommended track") {
            match filter.admit(&track) {
                Ok(()) => tracks.push(track),
                Err(reason) => info!("{} not added ({})", track.name, reason),
            }
        }

        if tracks.len() > options.target_length {
            break;
        }
    }

    Ok(tracks)
}

fn draw_seed<R: Rng + ?Sized>(
    index: &GenreIndex,
    options: &SampleOptions,
    rng: &mut R,
) -> Option<(String, String)> {
    for _ in 0..options.max_seed_attempts.max(1) {
        let (genre, seed) = index.pick(rng)?;
        if options.exclude_playlist_only && seed.is_playlist_only() {
            continue;
        }
        return Some((genre.to_string(), seed.artist_id.clone()));
    }
    None
}
