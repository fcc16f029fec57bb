use crate::{
    spotify::{MAX_PLAYLIST_URIS, SpotifyApi, SpotifyError},
    types::{CreatePlaylistRequest, CreatePlaylistResponse, Track},
    warning,
};

pub const PLAYLIST_DESCRIPTION: &str = "Get truly never-heard-before music for you!";

/// Creates a private playlist for the current user and fills it with the
/// first [`MAX_PLAYLIST_URIS`] tracks. Returns the playlist and the number of
/// tracks added.
pub async fn publish<A>(
    api: &A,
    name: &str,
    tracks: &[Track],
) -> Result<(CreatePlaylistResponse, usize), SpotifyError>
where
    A: SpotifyApi + ?Sized,
{
    let user = api.current_user().await?;

    let request = CreatePlaylistRequest {
        name: name.to_string(),
        description: PLAYLIST_DESCRIPTION.to_string(),
        public: false,
    };
    let playlist = api.create_playlist(&user.id, &request).await?;

    if tracks.len() > MAX_PLAYLIST_URIS {
        warning!(
            "Only the first {} of {} tracks are added to the playlist",
            MAX_PLAYLIST_URIS,
            tracks.len()
        );
    }

    let uris: Vec<String> = tracks
        .iter()
        .take(MAX_PLAYLIST_URIS)
        .map(Track::spotify_uri)
        .collect();

    if !uris.is_empty() {
        api.add_tracks(&playlist.id, &uris).await?;
    }

    Ok((playlist, uris.len()))
}
