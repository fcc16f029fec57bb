use tabled::Table;

use crate::{management::ArtistUniverseManager, types::Source, utils, warning};

pub async fn list_artists(search: Option<String>, source: Option<Source>) {
    let artist_mgr = match ArtistUniverseManager::load().await {
        Ok(mgr) => mgr,
        Err(e) => {
            warning!("Failed to load artists, run truedisc collect first. Err: {}", e);
            return;
        }
    };

    let rows = utils::artist_table_rows(artist_mgr.universe(), search.as_deref(), source);
    if rows.is_empty() {
        warning!("No artist matches.");
        return;
    }

    let table = Table::new(rows);
    println!("{}", table);
}
