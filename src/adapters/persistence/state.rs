//! State File - Atomic JSON Image of the Trade Store
//!
//! Saves the in-memory store to `state.json` using atomic writes
//! (write to tmp file, then rename), so the file on disk is always
//! either the previous image or the new one, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, instrument};

use super::memory_store::StoreImage;

/// Format version written into every state file.
pub const STATE_VERSION: u32 = 1;

/// On-disk envelope around a store image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(flatten)]
    pub image: StoreImage,
}

pub struct StateFile {
    state_path: PathBuf,
    tmp_path: PathBuf,
}

impl StateFile {
    /// Create a state file handle in `data_dir`, creating the directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            state_path: dir.join("state.json"),
            tmp_path: dir.join("state.json.tmp"),
        })
    }

    /// Save an image atomically (tmp → rename).
    #[instrument(skip(self, image))]
    pub async fn save(&self, image: StoreImage) -> Result<()> {
        let state = PersistedState {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            image,
        };
        let json = serde_json::to_string_pretty(&state).context("Failed to serialize state")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp state file")?;
        fs::rename(&self.tmp_path, &self.state_path)
            .await
            .context("Failed to rename state file")?;

        info!(
            path = %self.state_path.display(),
            bids = state.image.bids.len(),
            offers = state.image.offers.len(),
            "State saved"
        );
        Ok(())
    }

    /// Load the last saved image, `None` on first start.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<StoreImage>> {
        if !fs::try_exists(&self.state_path).await.unwrap_or(false) {
            info!("No state file found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.state_path)
            .await
            .context("Failed to read state file")?;
        let state: PersistedState =
            serde_json::from_str(&json).context("Failed to parse state JSON")?;
        anyhow::ensure!(
            state.version == STATE_VERSION,
            "Unsupported state file version {} (expected {STATE_VERSION})",
            state.version
        );

        info!(
            saved_at = %state.saved_at,
            bids = state.image.bids.len(),
            "State loaded"
        );
        Ok(Some(state.image))
    }
}
