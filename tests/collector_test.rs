mod common;

use std::time::Duration;

use common::{Call, FakeSpotify, Fault, artist, item, playlist, track};
use tempfile::tempdir;
use truedisc::{
    management::{CollectionStateManager, StateError},
    pipeline::{
        Advance, ArtistUniverse, Checkpoint, CollectionError, CollectionState, Collector,
        CollectorOptions, FetchCheckpoint, FetchOptions, HarvestOptions, RetryPolicy, Stage,
        collect,
    },
    spotify::{Category, SpotifyError},
    types::{Source, TimeRange},
};

fn options() -> CollectorOptions {
    CollectorOptions {
        fetch: FetchOptions {
            limit: 2,
            total_limit: 10_000,
            delay: Duration::ZERO,
        },
        harvest: HarvestOptions {
            page_size: 2,
            delay: Duration::ZERO,
        },
    }
}

fn no_wait(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_delay: Duration::ZERO,
    }
}

// A fresh run issues exactly ten requests:
// 1-3 top tracks, 4-6 top artists, 7 playlists, 8-9 playlist p1, 10 track artists
fn listener() -> FakeSpotify {
    FakeSpotify::new()
        .with_items(
            Category::Tracks,
            Some(TimeRange::ShortTerm),
            vec![track("t1", &["a1", "a4"])],
        )
        .with_items(
            Category::Artists,
            Some(TimeRange::ShortTerm),
            vec![artist("a2", "Beta", &["jazz"])],
        )
        .with_items(Category::Playlists, None, vec![playlist("p1", "Mix")])
        .with_playlist_tracks("p1", vec![item("t5", &["a3"])])
        .with_artist(artist("a1", "Alpha", &["rock"]))
        .with_artist(artist("a3", "Gamma", &["folk"]))
        .with_artist(artist("a4", "Delta", &["rock", "blues"]))
}

async fn reference_universe() -> ArtistUniverse {
    let api = listener();
    let mut collector = Collector::new(&api, options());
    collector.advance(false).await.unwrap().complete().unwrap()
}

#[tokio::test]
async fn test_full_collection_merges_all_sources() {
    let api = listener();
    let mut collector = Collector::new(&api, options());

    let universe = collector
        .advance(false)
        .await
        .unwrap()
        .complete()
        .expect("collection should complete");

    assert_eq!(api.call_count(), 10);
    assert_eq!(universe.len(), 4);
    assert!(universe.get("a3").unwrap().sources.contains(&Source::Playlists));
    assert!(universe.get("a2").unwrap().sources.contains(&Source::TopArtists));
    assert_eq!(universe.get("a4").unwrap().genres.len(), 2);

    let state = collector.state();
    assert_eq!(state.stage, Stage::Done);
    assert!(state.checkpoint.is_none());
    assert_eq!(state.universe.as_ref(), Some(&universe));
}

#[tokio::test]
async fn test_interruption_reports_stage_in_progress() {
    let api = listener();
    api.fail_on(7, Fault::RateLimited(2));
    let mut collector = Collector::new(&api, options());

    match collector.advance(false).await.unwrap() {
        Advance::Interrupted { stage, cause } => {
            assert_eq!(stage, Stage::AllPlaylists);
            assert!(cause.is_interruptible());
        }
        Advance::Complete(_) => panic!("expected an interruption"),
    }

    let state = collector.state();
    assert_eq!(state.stage, Stage::TopArtists);
    assert_eq!(state.top_tracks.len(), 1);
    assert_eq!(
        state.checkpoint.as_ref().map(|c| c.stage()),
        Some(Stage::AllPlaylists)
    );
}

#[tokio::test]
async fn test_resume_skips_completed_stages() {
    let api = listener();
    api.fail_on(7, Fault::Unauthorized);
    let mut collector = Collector::new(&api, options());
    assert!(!collector.advance(false).await.unwrap().is_complete());

    api.clear_calls();
    let universe = collector.advance(true).await.unwrap().complete().unwrap();

    assert_eq!(universe, reference_universe().await);
    assert_eq!(
        api.calls().first(),
        Some(&Call::Items {
            category: "playlists",
            limit: 2,
            offset: 0,
            time_range: None,
        })
    );
    assert!(!api.calls().iter().any(|c| matches!(
        c,
        Call::Items {
            category: "tracks" | "artists",
            ..
        }
    )));
}

#[tokio::test]
async fn test_interrupt_anywhere_then_resume_gives_same_universe() {
    let reference = reference_universe().await;

    for n in 1..=10 {
        let api = listener();
        api.fail_on(n, Fault::Unauthorized);
        let mut collector = Collector::new(&api, options());

        let first = collector.advance(false).await.unwrap();
        assert!(!first.is_complete(), "request {} should interrupt", n);

        let universe = collector.advance(true).await.unwrap().complete().unwrap();
        assert_eq!(universe, reference, "interrupted at request {}", n);
    }
}

#[tokio::test]
async fn test_advance_without_resume_starts_over() {
    let api = listener();
    api.fail_on(8, Fault::Unauthorized);
    let mut collector = Collector::new(&api, options());
    assert!(!collector.advance(false).await.unwrap().is_complete());

    api.clear_calls();
    collector.advance(false).await.unwrap().complete().unwrap();

    assert_eq!(api.call_count(), 10);
}

#[tokio::test]
async fn test_fatal_error_stops_collection() {
    let api = listener();
    api.fail_on(4, Fault::Server);
    let mut collector = Collector::new(&api, options());

    let result = collector.advance(false).await;

    assert!(matches!(result, Err(CollectionError::Remote(_))));
    assert_eq!(collector.state().stage, Stage::TopTracks);
}

#[tokio::test]
async fn test_collect_retries_until_complete() {
    let api = listener();
    api.fail_on(2, Fault::Unauthorized);
    api.fail_on(9, Fault::RateLimited(0));
    let mut collector = Collector::new(&api, options());

    let universe = collect(&mut collector, false, &no_wait(3)).await.unwrap();

    assert_eq!(universe, reference_universe().await);
}

#[tokio::test]
async fn test_collect_gives_up_after_retry_budget() {
    let api = listener();
    api.fail_always(Some(Fault::Unauthorized));
    let mut collector = Collector::new(&api, options());

    let result = collect(&mut collector, false, &no_wait(2)).await;

    match result {
        Err(CollectionError::RetriesExhausted { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected retries to run out, got {:?}", other.map(|u| u.len())),
    }
    assert_eq!(api.call_count(), 3);
}

#[tokio::test]
async fn test_mismatched_checkpoint_is_corrupt_state() {
    let api = listener();
    let state = CollectionState {
        stage: Stage::TopTracks,
        checkpoint: Some(Checkpoint::TopTracks(FetchCheckpoint::start(Category::Tracks))),
        ..CollectionState::default()
    };
    let mut collector = Collector::with_state(&api, options(), state);

    let result = collector.advance(true).await;

    assert!(matches!(result, Err(CollectionError::CorruptState(_))));
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn test_persisted_state_resumes_in_new_collector() {
    let dir = tempdir().unwrap();
    let store = CollectionStateManager::at(dir.path().join("state/collection.json"));
    let api = listener();
    api.fail_on(8, Fault::Unauthorized);

    let interrupted_state = {
        let mut collector = Collector::new(&api, options()).persist_to(&store);
        assert!(!collector.advance(false).await.unwrap().is_complete());
        collector.into_state()
    };

    let loaded = store.load().await.unwrap().expect("state should be on disk");
    assert_eq!(loaded, interrupted_state);
    assert_eq!(loaded.stage, Stage::AllPlaylists);
    assert!(matches!(
        loaded.checkpoint,
        Some(Checkpoint::PlaylistsArtists(_))
    ));

    let mut collector = Collector::with_state(&api, options(), loaded).persist_to(&store);
    let universe = collector.advance(true).await.unwrap().complete().unwrap();
    assert_eq!(universe, reference_universe().await);

    let done = store.load().await.unwrap().unwrap();
    assert_eq!(done.stage, Stage::Done);

    store.clear().await.unwrap();
    assert!(!store.exists().await);
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_fatal_error_on_resume_keeps_saved_checkpoint() {
    let dir = tempdir().unwrap();
    let store = CollectionStateManager::at(dir.path().join("state/collection.json"));
    let api = listener();
    // medium_term page of the top tracks
    api.fail_on(2, Fault::Unauthorized);
    let mut collector = Collector::new(&api, options()).persist_to(&store);
    assert!(!collector.advance(false).await.unwrap().is_complete());

    // the resumed request fails for good
    api.fail_on(3, Fault::Server);
    let result = collector.advance(true).await;
    assert!(matches!(result, Err(CollectionError::Remote(_))));

    let saved = store.load().await.unwrap().expect("state should be on disk");
    assert_eq!(saved.stage, Stage::NotStarted);
    match saved.checkpoint {
        Some(Checkpoint::TopTracks(cursor)) => {
            assert_eq!(cursor.collected.len(), 1);
            assert_eq!(
                cursor.time_ranges_left,
                vec![TimeRange::MediumTerm, TimeRange::LongTerm]
            );
        }
        other => panic!("expected the top tracks cursor, got {:?}", other),
    }

    // and the next run still picks up from there
    let universe = collector.advance(true).await.unwrap().complete().unwrap();
    assert_eq!(universe, reference_universe().await);
}

#[test]
fn test_error_messages() {
    let limited = SpotifyError::RateLimited {
        retry_after: Some(Duration::from_secs(12)),
    };
    assert_eq!(limited.to_string(), "rate limited, retry after 12s");
    assert_eq!(
        SpotifyError::RateLimited { retry_after: None }.to_string(),
        "rate limited"
    );

    let remote = CollectionError::from(SpotifyError::TokenInvalid);
    assert_eq!(remote.to_string(), "access token rejected by Spotify");
    assert_eq!(
        CollectionError::RetriesExhausted { attempts: 11 }.to_string(),
        "collection still interrupted after 11 attempts, giving up"
    );
}

#[tokio::test]
async fn test_loading_inconsistent_state_fails() {
    let dir = tempdir().unwrap();
    let store = CollectionStateManager::at(dir.path().join("collection.json"));
    let state = CollectionState {
        stage: Stage::AllPlaylists,
        checkpoint: Some(Checkpoint::TopTracks(FetchCheckpoint::start(Category::Tracks))),
        ..CollectionState::default()
    };
    store.persist(&state).await.unwrap();

    let result = store.load().await;

    assert!(matches!(result, Err(StateError::CriticalError(_))));
}

#[test]
fn test_stages_run_in_order() {
    let mut stage = Stage::NotStarted;
    let mut order = vec![stage.to_string()];
    while let Some(next) = stage.next() {
        stage = next;
        order.push(stage.to_string());
    }

    assert_eq!(
        order,
        vec![
            "NOT_STARTED",
            "TOP_TRACKS",
            "TOP_ARTISTS",
            "ALL_PLAYLISTS",
            "PLAYLISTS_ARTISTS",
            "TOP_TRACKS_ARTISTS",
            "DONE",
        ]
    );
}

#[test]
fn test_checkpoint_is_tagged_with_its_stage() {
    let checkpoint = Checkpoint::TopArtists(FetchCheckpoint::at(
        Category::Artists,
        40,
        vec![TimeRange::LongTerm],
    ));

    let value = serde_json::to_value(&checkpoint).unwrap();
    assert_eq!(value["stage"], "TOP_ARTISTS");
    assert_eq!(value["cursor"]["offset"], 40);
    assert_eq!(value["cursor"]["time_ranges_left"][0], "long_term");

    let restored: Checkpoint = serde_json::from_value(value).unwrap();
    assert_eq!(restored, checkpoint);
}
