//! JSON fixture file backing the in-memory stores.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use contenthub_base::{AvatarRecord, CommentRecord, MemoryStores, UserRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_AVATAR_BASE_URL: &str = "https://cdn.example.com/avatars";

/// Records of the base module's entity kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default = "default_avatar_base_url")]
    pub avatar_base_url: String,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
    #[serde(default)]
    pub avatars: Vec<AvatarRecord>,
}

impl Default for Fixtures {
    fn default() -> Self {
        Self {
            avatar_base_url: default_avatar_base_url(),
            users: Vec::new(),
            comments: Vec::new(),
            avatars: Vec::new(),
        }
    }
}

fn default_avatar_base_url() -> String {
    DEFAULT_AVATAR_BASE_URL.to_string()
}

impl Fixtures {
    /// Read fixtures from `path`. A missing file yields empty fixtures.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "fixture file not found, starting empty");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixtures from {}", path.display()))?;
        let fixtures: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid fixture file {}", path.display()))?;

        debug!(
            path = %path.display(),
            users = fixtures.users.len(),
            comments = fixtures.comments.len(),
            avatars = fixtures.avatars.len(),
            "fixtures loaded"
        );
        Ok(fixtures)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize fixtures")?;
        fs::write(path, json + "\n")
            .with_context(|| format!("failed to write fixtures to {}", path.display()))?;
        info!(path = %path.display(), "fixtures saved");
        Ok(())
    }

    /// Build in-memory stores holding these records.
    pub fn stores(&self) -> MemoryStores {
        MemoryStores::new(
            self.users.clone(),
            self.comments.clone(),
            self.avatars.clone(),
            self.avatar_base_url.clone(),
        )
    }

    /// Fixtures reflecting the current contents of `stores`.
    pub fn snapshot(&self, stores: &MemoryStores) -> Self {
        Self {
            avatar_base_url: self.avatar_base_url.clone(),
            users: stores.users.records().snapshot(),
            comments: stores.comments.snapshot(),
            avatars: stores.avatars.records().snapshot(),
        }
    }
}
