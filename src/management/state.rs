use std::path::PathBuf;

use thiserror::Error;

use crate::{config, pipeline::CollectionState};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("{0}")]
    CriticalError(String),
    #[error("invalid state file: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Keeps the collection state on disk so an interrupted collection can be
/// resumed by a later process.
pub struct CollectionStateManager {
    path: PathBuf,
}

impl CollectionStateManager {
    pub fn new() -> Self {
        Self::at(Self::default_path())
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub async fn persist(&self, state: &CollectionState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(state)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Returns `None` when nothing was persisted yet. A file that exists but
    /// cannot be parsed is an error, never silently replaced.
    pub async fn load(&self) -> Result<Option<CollectionState>, StateError> {
        if !self.exists().await {
            return Ok(None);
        }

        let json = async_fs::read_to_string(&self.path).await?;
        let state: CollectionState = serde_json::from_str(&json)?;

        if let Some(checkpoint) = &state.checkpoint {
            if state.in_progress() != Some(checkpoint.stage()) {
                return Err(StateError::CriticalError(format!(
                    "checkpoint for {} stored while stage {} is completed",
                    checkpoint.stage(),
                    state.stage
                )));
            }
        }

        Ok(Some(state))
    }

    pub async fn exists(&self) -> bool {
        async_fs::metadata(&self.path).await.is_ok()
    }

    pub async fn clear(&self) -> Result<(), StateError> {
        if !self.exists().await {
            return Ok(());
        }
        async_fs::remove_file(&self.path).await?;
        Ok(())
    }

    fn default_path() -> PathBuf {
        let mut path = config::data_dir();
        path.push("state/collection.json");
        path
    }
}
