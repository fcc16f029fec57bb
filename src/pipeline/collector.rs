use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    info,
    management::{CollectionStateManager, StateError},
    pipeline::{
        ArtistUniverse, FetchCheckpoint, FetchOptions, HarvestCheckpoint, HarvestOptions,
        ResolveCheckpoint, Step, fetch_items, harvest_playlist_artists, missing_track_artist_ids,
        pause, resolve_artists,
    },
    spotify::{Category, SpotifyApi, SpotifyError},
    success,
    types::{Artist, Playlist, Track},
    warning,
};

/// Collection stages in execution order. A state names the last stage that
/// completed; the next one is the stage in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    NotStarted,
    TopTracks,
    TopArtists,
    AllPlaylists,
    PlaylistsArtists,
    TopTracksArtists,
    Done,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::NotStarted => Some(Stage::TopTracks),
            Stage::TopTracks => Some(Stage::TopArtists),
            Stage::TopArtists => Some(Stage::AllPlaylists),
            Stage::AllPlaylists => Some(Stage::PlaylistsArtists),
            Stage::PlaylistsArtists => Some(Stage::TopTracksArtists),
            Stage::TopTracksArtists => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::NotStarted => "Collection not started",
            Stage::TopTracks => "Getting user top tracks",
            Stage::TopArtists => "Getting user top artists",
            Stage::AllPlaylists => "Getting user playlists",
            Stage::PlaylistsArtists => "Getting all playlist artists",
            Stage::TopTracksArtists => "Getting all top tracks artists",
            Stage::Done => "Merging all artists",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::NotStarted => "NOT_STARTED",
            Stage::TopTracks => "TOP_TRACKS",
            Stage::TopArtists => "TOP_ARTISTS",
            Stage::AllPlaylists => "ALL_PLAYLISTS",
            Stage::PlaylistsArtists => "PLAYLISTS_ARTISTS",
            Stage::TopTracksArtists => "TOP_TRACKS_ARTISTS",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Cursor of the stage that was interrupted, tagged with that stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "cursor", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Checkpoint {
    TopTracks(FetchCheckpoint<Track>),
    TopArtists(FetchCheckpoint<Artist>),
    AllPlaylists(FetchCheckpoint<Playlist>),
    PlaylistsArtists(HarvestCheckpoint),
    TopTracksArtists(ResolveCheckpoint),
}

impl Checkpoint {
    pub fn stage(&self) -> Stage {
        match self {
            Checkpoint::TopTracks(_) => Stage::TopTracks,
            Checkpoint::TopArtists(_) => Stage::TopArtists,
            Checkpoint::AllPlaylists(_) => Stage::AllPlaylists,
            Checkpoint::PlaylistsArtists(_) => Stage::PlaylistsArtists,
            Checkpoint::TopTracksArtists(_) => Stage::TopTracksArtists,
        }
    }

    /// Number of items gathered before the interruption.
    pub fn collected(&self) -> usize {
        match self {
            Checkpoint::TopTracks(c) => c.collected.len(),
            Checkpoint::TopArtists(c) => c.collected.len(),
            Checkpoint::AllPlaylists(c) => c.collected.len(),
            Checkpoint::PlaylistsArtists(c) => c.artists_collected.len(),
            Checkpoint::TopTracksArtists(c) => c.resolved.len(),
        }
    }
}

/// Everything a collection run has produced so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionState {
    pub stage: Stage,
    #[serde(default)]
    pub top_tracks: Vec<Track>,
    #[serde(default)]
    pub top_artists: Vec<Artist>,
    #[serde(default)]
    pub playlists: Vec<Playlist>,
    #[serde(default)]
    pub playlist_artists: Vec<Artist>,
    #[serde(default)]
    pub track_artists: Vec<Artist>,
    #[serde(default)]
    pub checkpoint: Option<Checkpoint>,
    #[serde(default)]
    pub universe: Option<ArtistUniverse>,
}

impl CollectionState {
    /// The stage that runs on the next advance, `None` once done.
    pub fn in_progress(&self) -> Option<Stage> {
        self.stage.next()
    }
}

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Remote(#[from] SpotifyError),
    /// The persisted state cannot be resumed.
    #[error("cannot resume collection: {0}")]
    CorruptState(String),
    #[error("collection still interrupted after {attempts} attempts, giving up")]
    RetriesExhausted { attempts: u32 },
    #[error("cannot persist collection state: {0}")]
    State(#[from] StateError),
}

/// Outcome of [`Collector::advance`].
#[derive(Debug)]
pub enum Advance {
    Complete(ArtistUniverse),
    /// `stage` was in progress when `cause` stopped it.
    Interrupted { stage: Stage, cause: SpotifyError },
}

impl Advance {
    pub fn is_complete(&self) -> bool {
        matches!(self, Advance::Complete(_))
    }

    pub fn complete(self) -> Option<ArtistUniverse> {
        match self {
            Advance::Complete(universe) => Some(universe),
            Advance::Interrupted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectorOptions {
    pub fetch: FetchOptions,
    pub harvest: HarvestOptions,
}

impl CollectorOptions {
    /// Default page sizes with one shared pause between requests.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            fetch: FetchOptions {
                delay,
                ..FetchOptions::default()
            },
            harvest: HarvestOptions {
                delay,
                ..HarvestOptions::default()
            },
        }
    }
}

/// Stage machine collecting the artist universe for one credential.
///
/// The collector owns its [`CollectionState`]. When a store is attached the
/// state is written after every completed stage and every interruption.
pub struct Collector<'a, A: SpotifyApi + ?Sized> {
    api: &'a A,
    options: CollectorOptions,
    state: CollectionState,
    store: Option<&'a CollectionStateManager>,
}

impl<'a, A: SpotifyApi + ?Sized> Collector<'a, A> {
    pub fn new(api: &'a A, options: CollectorOptions) -> Self {
        Self::with_state(api, options, CollectionState::default())
    }

    /// Continues from a previously persisted state.
    pub fn with_state(api: &'a A, options: CollectorOptions, state: CollectionState) -> Self {
        Self {
            api,
            options,
            state,
            store: None,
        }
    }

    pub fn persist_to(mut self, store: &'a CollectionStateManager) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    pub fn into_state(self) -> CollectionState {
        self.state
    }

    /// Runs stages until the universe is complete or a stage is interrupted.
    ///
    /// Without `resume` all previous progress is discarded first. With
    /// `resume` the interrupted stage continues from its checkpoint and the
    /// completed stages are not run again. An interruption leaves the stage
    /// unchanged and is reported with the stage that was in progress. A fatal
    /// error keeps the checkpoint of the stage, so the saved state can still
    /// be resumed.
    pub async fn advance(
        &mut self,
        resume: bool,
    ) -> Result<Advance, CollectionError> {
        if !resume {
            self.state = CollectionState::default();
        }

        loop {
            if self.state.stage == Stage::Done {
                let universe = match &self.state.universe {
                    Some(universe) => universe.clone(),
                    None => {
                        let universe = self.merge();
                        self.state.universe = Some(universe.clone());
                        universe
                    }
                };
                return Ok(Advance::Complete(universe));
            }

            match self.step().await {
                Ok(Step::Complete(stage)) => {
                    info!("{} done.", stage.description());
                    self.save().await?;
                }
                Ok(Step::Interrupted { checkpoint, cause }) => {
                    self.state.checkpoint = Some(checkpoint);
                    self.save().await?;
                    return Ok(Advance::Interrupted {
                        stage: self.state.stage.next().unwrap_or(Stage::Done),
                        cause,
                    });
                }
                Err(e) => {
                    self.save().await?;
                    return Err(e);
                }
            }
        }
    }

    /// Runs the single transition out of the current stage.
    async fn step(&mut self) -> Result<Step<Stage, Checkpoint>, CollectionError> {
        let Some(target) = self.state.stage.next() else {
            return Ok(Step::Complete(Stage::Done));
        };

        let checkpoint = self.state.checkpoint.clone();
        if let Some(cp) = &checkpoint {
            if cp.stage() != target {
                return Err(CollectionError::CorruptState(format!(
                    "checkpoint belongs to stage {} but stage {} is in progress",
                    cp.stage(),
                    target
                )));
            }
            info!(
                "Resuming {} with {} items already collected.",
                target,
                cp.collected()
            );
        } else {
            info!("{} ...", target.description());
        }

        let api = self.api;
        let fetch = &self.options.fetch;

        match (target, checkpoint) {
            (Stage::TopTracks, cp) => {
                let resume = match cp {
                    Some(Checkpoint::TopTracks(c)) => Some(c),
                    _ => None,
                };
                match fetch_items(api, Category::Tracks, fetch, resume).await? {
                    Step::Complete(items) => self.state.top_tracks = items,
                    Step::Interrupted { checkpoint, cause } => {
                        return Ok(interrupted(Checkpoint::TopTracks(checkpoint), cause));
                    }
                }
            }
            (Stage::TopArtists, cp) => {
                let resume = match cp {
                    Some(Checkpoint::TopArtists(c)) => Some(c),
                    _ => None,
                };
                match fetch_items(api, Category::Artists, fetch, resume).await? {
                    Step::Complete(items) => self.state.top_artists = items,
                    Step::Interrupted { checkpoint, cause } => {
                        return Ok(interrupted(Checkpoint::TopArtists(checkpoint), cause));
                    }
                }
            }
            (Stage::AllPlaylists, cp) => {
                let resume = match cp {
                    Some(Checkpoint::AllPlaylists(c)) => Some(c),
                    _ => None,
                };
                match fetch_items(api, Category::Playlists, fetch, resume).await? {
                    Step::Complete(items) => self.state.playlists = items,
                    Step::Interrupted { checkpoint, cause } => {
                        return Ok(interrupted(Checkpoint::AllPlaylists(checkpoint), cause));
                    }
                }
            }
            (Stage::PlaylistsArtists, cp) => {
                let resume = match cp {
                    Some(Checkpoint::PlaylistsArtists(c)) => Some(c),
                    _ => None,
                };
                let playlists = self.state.playlists.clone();
                match harvest_playlist_artists(api, playlists, &self.options.harvest, resume)
                    .await?
                {
                    Step::Complete(artists) => self.state.playlist_artists = artists,
                    Step::Interrupted { checkpoint, cause } => {
                        return Ok(interrupted(Checkpoint::PlaylistsArtists(checkpoint), cause));
                    }
                }
            }
            (Stage::TopTracksArtists, cp) => {
                let resume = match cp {
                    Some(Checkpoint::TopTracksArtists(c)) => Some(c),
                    _ => None,
                };
                let missing = missing_track_artist_ids(
                    &self.state.top_tracks,
                    &self.state.top_artists,
                    &self.state.playlist_artists,
                );
                match resolve_artists(api, missing, fetch.delay, resume).await? {
                    Step::Complete(artists) => self.state.track_artists = artists,
                    Step::Interrupted { checkpoint, cause } => {
                        return Ok(interrupted(Checkpoint::TopTracksArtists(checkpoint), cause));
                    }
                }
            }
            (Stage::Done, _) => {
                self.state.universe = Some(self.merge());
            }
            (Stage::NotStarted, _) => {
                return Err(CollectionError::CorruptState(
                    "no stage leads back to NOT_STARTED".to_string(),
                ));
            }
        }

        self.state.stage = target;
        self.state.checkpoint = None;
        Ok(Step::Complete(target))
    }

    fn merge(&self) -> ArtistUniverse {
        ArtistUniverse::merge(
            &self.state.top_tracks,
            &self.state.top_artists,
            &self.state.playlist_artists,
            &self.state.track_artists,
        )
    }

    async fn save(&self) -> Result<(), CollectionError> {
        if let Some(store) = self.store {
            store.persist(&self.state).await?;
        }
        Ok(())
    }
}

fn interrupted(checkpoint: Checkpoint, cause: SpotifyError) -> Step<Stage, Checkpoint> {
    Step::Interrupted { checkpoint, cause }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Interrupted attempts tolerated after the first one.
    pub max_retries: u32,
    /// Pause before resuming, unless the service asked for a longer one.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            retry_delay: Duration::from_secs(30),
        }
    }
}

/// Drives [`Collector::advance`] until the universe is complete.
///
/// Each interruption consumes one retry and the next attempt resumes the
/// interrupted stage. Running out of retries is a fatal error, never a
/// partial result.
pub async fn collect<A>(
    collector: &mut Collector<'_, A>,
    resume: bool,
    policy: &RetryPolicy,
) -> Result<ArtistUniverse, CollectionError>
where
    A: SpotifyApi + ?Sized,
{
    let mut resume = resume;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match collector.advance(resume).await? {
            Advance::Complete(universe) => {
                success!("Collected {} artists.", universe.len());
                return Ok(universe);
            }
            Advance::Interrupted { stage, cause } => {
                if attempts > policy.max_retries {
                    return Err(CollectionError::RetriesExhausted { attempts });
                }

                warning!(
                    "Data collection interrupted during {} ({}). Resuming... {} retries left.",
                    stage,
                    cause,
                    policy.max_retries - attempts
                );
                let wait = cause
                    .retry_after()
                    .map_or(policy.retry_delay, |after| after.max(policy.retry_delay));
                pause(wait).await;
                resume = true;
            }
        }
    }
}
