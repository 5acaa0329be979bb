pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};
pub use config::JobConfig;

pub use core::{
    ephemeris::AnalyticEphemeris,
    etl::EtlEngine,
    job::{AspectJob, JobOutcome, PublishStatus},
    pipeline::AspectPipeline,
    publish::{GitPublishConfig, GitPublisher},
    schedule::DailySchedule,
};
pub use utils::error::{AspectError, Result};
