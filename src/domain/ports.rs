use crate::domain::model::{AspectSettings, Body, DailyPositions, OutputFormat, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn output_path(&self) -> &str;
    fn output_filename(&self) -> &str;
    fn output_formats(&self) -> &[OutputFormat];
    /// First date of the window; `None` means today (UTC).
    fn start_date(&self) -> Option<NaiveDate>;
    fn days(&self) -> usize;
    fn aspect_settings(&self) -> &AspectSettings;
}

/// Source of apparent ecliptic longitudes.
pub trait Ephemeris: Send + Sync {
    /// Longitude in degrees, normalized to `[0, 360)`.
    fn longitude(&self, body: Body, at: DateTime<Utc>) -> Result<f64>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<DailyPositions>>;
    async fn transform(&self, data: Vec<DailyPositions>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A commit was created and pushed; carries the new HEAD.
    Published { commit: String },
    NothingToCommit,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, file: &Path) -> Result<PublishOutcome>;
}
