use std::{
    collections::{BTreeSet, HashSet},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    info,
    pipeline::{Step, decode_items, pause},
    spotify::{MAX_ARTIST_IDS, PLAYLIST_TRACKS_PAGE, SpotifyApi, SpotifyError},
    types::{Artist, Playlist, PlaylistTrackItem, Source},
    warning,
};

#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub page_size: u32,
    pub delay: Duration,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            page_size: PLAYLIST_TRACKS_PAGE,
            delay: Duration::from_secs(5),
        }
    }
}

/// Progress of a playlist walk.
///
/// `playlists_left` starts with the playlist that was being read when the walk
/// was suspended; it is read again from its first page on resume, the ids in
/// `collected_artist_ids` make sure its artists are not fetched twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestCheckpoint {
    pub playlists_left: Vec<Playlist>,
    pub artists_collected: Vec<Artist>,
    pub collected_artist_ids: BTreeSet<String>,
}

impl HarvestCheckpoint {
    pub fn start(playlists: Vec<Playlist>) -> Self {
        Self {
            playlists_left: playlists,
            artists_collected: Vec::new(),
            collected_artist_ids: BTreeSet::new(),
        }
    }
}

/// Expands playlists into the full records of their tracks' artists.
///
/// Every artist comes back tagged with [`Source::Playlists`]. Artist
/// references without an id (local or unavailable tracks) are logged and
/// skipped. With `resume` set, `playlists` is ignored and the walk continues
/// at the checkpoint's first unprocessed playlist.
pub async fn harvest_playlist_artists<A>(
    api: &A,
    playlists: Vec<Playlist>,
    options: &HarvestOptions,
    resume: Option<HarvestCheckpoint>,
) -> Result<Step<Vec<Artist>, HarvestCheckpoint>, SpotifyError>
where
    A: SpotifyApi + ?Sized,
{
    let mut state = resume.unwrap_or_else(|| HarvestCheckpoint::start(playlists));
    let page_size = options.page_size.max(1);

    while let Some(playlist) = state.playlists_left.first().cloned() {
        let mut offset = 0;

        loop {
            pause(options.delay).await;

            let items = match api
                .playlist_tracks_page(&playlist.id, page_size, offset)
                .await
            {
                Ok(items) => items,
                Err(e) if e.is_interruptible() => {
                    return Ok(Step::Interrupted {
                        checkpoint: state,
                        cause: e,
                    });
                }
                Err(e) => return Err(e),
            };

            let page_len = items.len();
            let unseen = unseen_artist_ids(
                &playlist,
                decode_items::<PlaylistTrackItem>(items, "playlist item"),
                &state.collected_artist_ids,
            );

            for chunk in unseen.chunks(MAX_ARTIST_IDS) {
                pause(options.delay).await;

                let artists = match fetch_artist_details(api, chunk).await {
                    Ok(artists) => artists,
                    Err(e) if e.is_interruptible() => {
                        return Ok(Step::Interrupted {
                            checkpoint: state,
                            cause: e,
                        });
                    }
                    Err(e) => return Err(e),
                };

                state.collected_artist_ids.extend(chunk.iter().cloned());
                for mut artist in artists {
                    artist.sources.insert(Source::Playlists);
                    state.artists_collected.push(artist);
                }
            }

            if page_len < page_size as usize {
                break;
            }
            offset += page_size;
        }

        info!(
            "Collected artists of playlist {} ({} artists so far)",
            playlist.name,
            state.artists_collected.len()
        );
        state.playlists_left.remove(0);
    }

    Ok(Step::Complete(state.artists_collected))
}

/// Ids referenced by a page of playlist items that were not collected yet, in
/// order of first appearance.
fn unseen_artist_ids(
    playlist: &Playlist,
    items: Vec<PlaylistTrackItem>,
    collected: &BTreeSet<String>,
) -> Vec<String> {
    let mut page_ids: HashSet<String> = HashSet::new();
    let mut unseen = Vec::new();

    for track in items.into_iter().filter_map(|item| item.track) {
        for artist in track.artists {
            match artist.id {
                Some(id) => {
                    if !collected.contains(&id) && page_ids.insert(id.clone()) {
                        unseen.push(id);
                    }
                }
                None => info!(
                    "Skipping unknown artist {} on track {} in playlist {}",
                    artist.name, track.name, playlist.name
                ),
            }
        }
    }

    unseen
}

/// Full artist records for the given ids, requested in batches.
///
/// Records that cannot be decoded are logged and skipped; ids the service
/// does not know are simply missing from the result.
pub(crate) async fn fetch_artist_details<A>(
    api: &A,
    ids: &[String],
) -> Result<Vec<Artist>, SpotifyError>
where
    A: SpotifyApi + ?Sized,
{
    let mut artists = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(MAX_ARTIST_IDS) {
        let raw = api.artists(chunk).await?;
        artists.extend(decode_items::<Artist>(raw, "artist"));
    }

    if artists.len() < ids.len() {
        warning!(
            "Only {} of {} requested artists could be resolved",
            artists.len(),
            ids.len()
        );
    }

    Ok(artists)
}
