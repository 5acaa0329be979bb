pub mod aspects;
pub mod ephemeris;
pub mod etl;
pub mod job;
pub mod patterns;
pub mod pipeline;
pub mod publish;
pub mod schedule;

pub use crate::domain::model::{DailyPositions, TransformResult, WeeklyReport};
pub use crate::domain::ports::{
    ConfigProvider, Ephemeris, Pipeline, PublishOutcome, Publisher, Storage,
};
pub use crate::utils::error::Result;
