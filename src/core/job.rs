use crate::core::etl::EtlEngine;
use crate::core::{Pipeline, PublishOutcome, Publisher};
use crate::utils::error::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    Published { commit: String },
    NothingToCommit,
    /// Publishing is disabled for this run.
    Skipped,
}

impl From<PublishOutcome> for PublishStatus {
    fn from(outcome: PublishOutcome) -> Self {
        match outcome {
            PublishOutcome::Published { commit } => PublishStatus::Published { commit },
            PublishOutcome::NothingToCommit => PublishStatus::NothingToCommit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub output_path: PathBuf,
    pub publish: PublishStatus,
}

/// One scheduled run: compute and write the report, then publish it.
pub struct AspectJob<P: Pipeline> {
    engine: EtlEngine<P>,
    publisher: Option<Box<dyn Publisher>>,
}

impl<P: Pipeline> AspectJob<P> {
    pub fn new(engine: EtlEngine<P>) -> Self {
        Self {
            engine,
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub async fn run(&self) -> Result<JobOutcome> {
        let output_path = PathBuf::from(self.engine.run().await?);

        let publish = match &self.publisher {
            Some(publisher) => {
                tracing::info!("📤 Publishing {}", output_path.display());
                publisher.publish(&output_path).await?.into()
            }
            None => {
                tracing::debug!("Publishing disabled, leaving {} in place", output_path.display());
                PublishStatus::Skipped
            }
        };

        Ok(JobOutcome {
            output_path,
            publish,
        })
    }
}
