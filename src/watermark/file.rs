use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone as _, Utc};
use std::path::PathBuf;

use super::WatermarkStore;

/// Keeps the watermark as a single ISO-8601 line in a file
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn write(&self, timestamp: DateTime<Utc>) -> Result<()> {
        let content = format!(
            "{}\n",
            timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        );

        // First write to temporary file so we don't lose the old watermark if writing fails halfway
        let filename = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("Path has no filename"))?
            .to_str()
            .ok_or_else(|| anyhow!("Filename isn't valid utf-8"))?;
        let tmppath = self.path.with_file_name(format!("{}.temp", filename));
        tokio::fs::write(&tmppath, content)
            .await
            .with_context(|| anyhow!("Failed to write {}", tmppath.display()))?;
        tokio::fs::rename(&tmppath, &self.path)
            .await
            .with_context(|| anyhow!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| anyhow!("Failed to check {}", self.path.display()))?
        {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| anyhow!("Failed to read {}", self.path.display()))?;
        let timestamp = parse_timestamp(content.trim()).with_context(|| {
            anyhow!(
                "Invalid last execution timestamp in {}",
                self.path.display()
            )
        })?;
        Ok(Some(timestamp))
    }

    async fn initialize(&self, now: DateTime<Utc>) -> Result<()> {
        self.write(now).await
    }

    async fn advance(&self, to: DateTime<Utc>) -> Result<()> {
        self.write(to).await
    }

    async fn reset(&self, now: DateTime<Utc>) -> Result<()> {
        self.write(now).await
    }
}

fn parse_timestamp(content: &str) -> Result<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(content) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    // Older versions wrote local time without an offset
    let naive = NaiveDateTime::parse_from_str(content, "%Y-%m-%dT%H:%M:%S%.f")?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("{content} doesn't exist in the local timezone"))?;
    Ok(local.with_timezone(&Utc))
}
