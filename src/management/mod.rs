mod artist;
mod auth;
mod state;

pub use artist::ArtistUniverseManager;
pub use artist::TrackListManager;
pub use auth::TokenManager;
pub use state::CollectionStateManager;
pub use state::StateError;
