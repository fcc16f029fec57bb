use std::{cmp::Ordering, collections::HashSet, time::Duration};

use chrono::{DateTime, TimeZone};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    pipeline::ArtistUniverse,
    types::{ArtistTableRow, Identified, Source, Track, TrackTableRow},
};

pub fn remove_duplicates_by_id<T: Identified>(items: &mut Vec<T>) {
    let mut seen_ids = HashSet::new();
    items.retain(|item| seen_ids.insert(item.id().to_string()));
}

/// Name of the playlist created at `now`, e.g. `True Discover Weekly 19/10/2026 08:30`.
pub fn playlist_name<Tz: TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("True Discover Weekly {}", now.format("%d/%m/%Y %H:%M"))
}

/// Table rows of the universe, filtered by a case-insensitive name search and
/// a required source, sorted by name.
pub fn artist_table_rows(
    universe: &ArtistUniverse,
    search: Option<&str>,
    source: Option<Source>,
) -> Vec<ArtistTableRow> {
    let search_term = search.map(|s| s.to_lowercase());

    let mut artists: Vec<_> = universe
        .artists()
        .iter()
        .filter(|a| match &search_term {
            Some(term) => a.name.to_lowercase().contains(term),
            None => true,
        })
        .filter(|a| source.is_none_or(|s| a.sources.contains(&s)))
        .collect();

    artists.sort_by(|a, b| compare_names(&a.name, &b.name));

    artists
        .into_iter()
        .map(|a| ArtistTableRow {
            name: a.name.clone(),
            genres: a
                .genres
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(","),
            sources: a
                .sources
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(","),
        })
        .collect()
}

pub fn track_table_rows(tracks: &[Track]) -> Vec<TrackTableRow> {
    tracks
        .iter()
        .map(|t| TrackTableRow {
            name: t.name.clone(),
            artists: t
                .artists
                .iter()
                .map(|a| a.name.clone())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect()
}

fn compare_names(a: &str, b: &str) -> Ordering {
    match a.to_lowercase().cmp(&b.to_lowercase()) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

/// A steadily ticking spinner showing `message`.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb
}
