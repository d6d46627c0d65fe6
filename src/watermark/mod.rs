use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

mod file;

pub use file::FileWatermarkStore;

/// The instant up to which transactions have already been considered for import.
///
/// Read or write errors are fatal to the caller, since losing this state would
/// either skip transactions or import them again.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Returns Ok(None) if auto import never ran
    async fn load(&self) -> Result<Option<DateTime<Utc>>>;

    /// First auto import run. Nothing gets imported, the next run starts at `now`.
    async fn initialize(&self, now: DateTime<Utc>) -> Result<()>;

    /// Called after an auto import run covered everything up to `to`
    async fn advance(&self, to: DateTime<Utc>) -> Result<()>;

    /// Skip everything that happened before `now`
    async fn reset(&self, now: DateTime<Utc>) -> Result<()>;
}
