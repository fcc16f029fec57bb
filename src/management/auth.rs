use std::path::PathBuf;

use chrono::Utc;

use crate::{config, spotify, types::Token, warning};

/// Lifetime assumed for a token handed over through the environment.
const ENV_TOKEN_LIFETIME_SECS: u64 = 3600;

pub struct TokenManager {
    token: Token,
    refreshable: bool,
}

impl TokenManager {
    pub fn new(token: Token) -> Self {
        TokenManager {
            refreshable: !token.refresh_token.is_empty(),
            token,
        }
    }

    /// Loads the cached token, falling back to `SPOTIFY_ACCESS_TOKEN`.
    pub async fn load() -> Result<Self, String> {
        match Self::load_from(&Self::token_path()).await {
            Ok(mgr) => Ok(mgr),
            Err(cache_err) => match config::spotify_access_token() {
                Some(access_token) => Ok(Self::from_access_token(access_token)),
                None => Err(format!(
                    "{}. Store a token in {} or set SPOTIFY_ACCESS_TOKEN",
                    cache_err,
                    Self::token_path().display()
                )),
            },
        }
    }

    pub async fn load_from(path: &PathBuf) -> Result<Self, String> {
        let content = async_fs::read_to_string(path)
            .await
            .map_err(|e| e.to_string())?;
        let token: Token = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(Self::new(token))
    }

    pub fn from_access_token(access_token: String) -> Self {
        Self {
            token: Token {
                access_token,
                refresh_token: String::new(),
                scope: String::new(),
                expires_in: ENV_TOKEN_LIFETIME_SECS,
                obtained_at: Utc::now().timestamp() as u64,
            },
            refreshable: false,
        }
    }

    pub async fn persist(&self) -> Result<(), String> {
        let path = Self::token_path();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(&self.token).map_err(|e| e.to_string())?;
        async_fs::write(path, json)
            .await
            .map_err(|e| e.to_string())
    }

    /// Returns the access token, refreshing and persisting it first when it is
    /// about to expire. A failed refresh keeps the old token; Spotify will then
    /// answer 401 and the pipeline treats that as an interruption.
    pub async fn get_valid_token(&mut self) -> String {
        if self.refreshable && self.is_expired() {
            match spotify::auth::refresh_token(&self.token.refresh_token).await {
                Ok(new_token) => {
                    self.token = new_token;
                    if let Err(e) = self.persist().await {
                        warning!("Cannot persist refreshed token. Err: {}", e);
                    }
                }
                Err(e) => warning!("Cannot refresh access token. Err: {}", e),
            }
        }

        self.token.access_token.clone()
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as u64;
        now + 240 >= self.token.obtained_at + self.token.expires_in
    }

    fn token_path() -> PathBuf {
        let mut path = config::data_dir();
        path.push("cache/token.json");
        path
    }

    pub fn current_token(&self) -> &Token {
        &self.token
    }
}
