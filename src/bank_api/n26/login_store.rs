use anyhow::{anyhow, Context as _, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoginData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl LoginData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Debug for LoginData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginData(*****, expires_at={})", self.expires_at)
    }
}

/// Keeps the N26 tokens of one user between runs
pub struct LoginStore {
    path: PathBuf,
}

impl LoginStore {
    pub fn new(directory: &Path, username: &str) -> Self {
        Self {
            path: directory.join(format!("{username}.json")),
        }
    }

    /// Returns Ok(None) if nothing was stored yet or the stored file can't be read
    pub async fn load(&self) -> Result<Option<LoginData>> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| anyhow!("Failed to check {}", self.path.display()))?
        {
            return Ok(None);
        }
        let content = tokio::fs::read(&self.path)
            .await
            .with_context(|| anyhow!("Failed to read {}", self.path.display()))?;
        match serde_json::from_slice(&content) {
            Ok(login_data) => Ok(Some(login_data)),
            Err(err) => {
                log::warn!(
                    "Ignoring corrupt login data in {}: {}",
                    self.path.display(),
                    err
                );
                Ok(None)
            }
        }
    }

    pub async fn save(&self, login_data: &LoginData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| anyhow!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_vec(login_data)?;

        let filename = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("Path has no filename"))?
            .to_str()
            .ok_or_else(|| anyhow!("Filename isn't valid utf-8"))?;
        let tmppath = self.path.with_file_name(format!("{}.temp", filename));
        tokio::fs::write(&tmppath, content).await?;
        tokio::fs::rename(&tmppath, &self.path).await?;
        Ok(())
    }
}
