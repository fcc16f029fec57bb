//! Configuration management for truedisc.
//!
//! Configuration values come from environment variables and an optional `.env`
//! file in the local data directory. Environment variables always win over the
//! `.env` file because `dotenv` never overrides variables that are already set.
//!
//! Settings with a sensible default fall back to it; settings without one
//! return `None` so callers can decide how to report the omission.

use std::{env, path::PathBuf, time::Duration};

pub const APP_DIR: &str = "truedisc";

const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_REQUEST_DELAY_SECS: u64 = 5;
const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 10;

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the application directory if it doesn't exist. A missing `.env`
/// file is not an error, every setting can also come from the environment.
///
/// The file is looked up in:
/// - Linux: `~/.local/share/truedisc/.env`
/// - macOS: `~/Library/Application Support/truedisc/.env`
/// - Windows: `%LOCALAPPDATA%/truedisc/.env`
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    match dotenv::from_path(&path) {
        Ok(_) => Ok(()),
        Err(dotenv::Error::Io(_)) => Ok(()),
        Err(e) => Err(format!("Cannot parse {}: {}", path.display(), e)),
    }
}

/// Root of all files truedisc writes.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

/// Returns the Spotify Web API base URL.
///
/// Reads `SPOTIFY_API_URL`, defaulting to `https://api.spotify.com/v1`.
/// Trailing slashes are stripped so paths can be appended directly.
pub fn spotify_apiurl() -> String {
    env::var("SPOTIFY_API_URL")
        .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Returns the OAuth token endpoint used for the refresh-token grant.
pub fn spotify_apitoken_url() -> String {
    env::var("SPOTIFY_API_TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string())
}

/// Returns the client id registered on the Spotify developer dashboard.
///
/// Only needed to refresh an expired token.
pub fn spotify_client_id() -> Option<String> {
    non_empty_var("SPOTIFY_API_AUTH_CLIENT_ID")
}

/// Returns a raw bearer token supplied through `SPOTIFY_ACCESS_TOKEN`.
pub fn spotify_access_token() -> Option<String> {
    non_empty_var("SPOTIFY_ACCESS_TOKEN")
}

/// Pause between two consecutive remote requests.
pub fn request_delay() -> Duration {
    Duration::from_secs(parsed_var(
        "TRUEDISC_REQUEST_DELAY_SECS",
        DEFAULT_REQUEST_DELAY_SECS,
    ))
}

/// Pause after an interrupted collection attempt before resuming.
pub fn retry_delay() -> Duration {
    Duration::from_secs(parsed_var(
        "TRUEDISC_RETRY_DELAY_SECS",
        DEFAULT_RETRY_DELAY_SECS,
    ))
}

/// Number of interrupted attempts tolerated before collection is aborted.
pub fn max_retries() -> u32 {
    parsed_var("TRUEDISC_MAX_RETRIES", DEFAULT_MAX_RETRIES)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    non_empty_var(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
