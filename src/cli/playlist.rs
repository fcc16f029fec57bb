use chrono::Local;
use rand::{SeedableRng, rngs::StdRng};
use tabled::Table;

use crate::{
    config, error, info,
    management::{ArtistUniverseManager, TrackListManager},
    pipeline::{self, SampleOptions},
    spotify::{SpotifyClient, playlist::publish},
    success,
    types::Track,
    utils, warning,
};

use super::authorized_client;

#[derive(Debug, Clone)]
pub struct PlaylistArgs {
    pub length: usize,
    pub exclude_playlist_only: bool,
    pub rounds: u32,
    pub dry_run: bool,
    /// Publish the last sampled track list instead of sampling again.
    pub reuse: bool,
}

pub async fn playlist(args: PlaylistArgs) {
    let client = authorized_client().await;

    let tracks = if args.reuse {
        match TrackListManager::load().await {
            Ok(mgr) => mgr.tracks().to_vec(),
            Err(e) => error!("No sampled track list to reuse. Err: {}", e),
        }
    } else {
        sample_tracks(&client, &args).await
    };

    if tracks.is_empty() {
        warning!("No never-heard track found, nothing to publish.");
        return;
    }

    println!("{}", Table::new(utils::track_table_rows(&tracks)));

    if args.dry_run {
        success!("Sampled {} tracks (dry run, no playlist created).", tracks.len());
        return;
    }

    let name = utils::playlist_name(Local::now());
    let pb = utils::spinner(&format!("Creating playlist {}...", name));
    match publish(&client, &name, &tracks).await {
        Ok((playlist, added)) => {
            pb.finish_and_clear();
            success!(
                "Created playlist {} ({}) with {} tracks.",
                playlist.name,
                playlist.id,
                added
            );
        }
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to create playlist. Err: {}", e);
        }
    }
}

async fn sample_tracks(client: &SpotifyClient, args: &PlaylistArgs) -> Vec<Track> {
    let artist_mgr = match ArtistUniverseManager::load().await {
        Ok(mgr) => mgr,
        Err(e) => error!("Failed to load artists, run truedisc collect first. Err: {}", e),
    };

    let options = SampleOptions {
        target_length: args.length,
        exclude_playlist_only: args.exclude_playlist_only,
        rounds: args.rounds,
        delay: config::request_delay(),
        ..SampleOptions::default()
    };

    info!("Getting recommendations ...");
    let mut rng = StdRng::from_os_rng();
    let tracks = match pipeline::sample(client, artist_mgr.universe(), &options, &mut rng).await {
        Ok(tracks) => tracks,
        Err(e) => error!("Failed to get recommendations. Err: {}", e),
    };

    let track_mgr = TrackListManager::new(tracks);
    if let Err(e) = track_mgr.persist().await {
        warning!("Cannot cache sampled tracks. Err: {}", e);
    }
    track_mgr.tracks().to_vec()
}
