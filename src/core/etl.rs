use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Drives one extract → transform → load pass of a [`Pipeline`].
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting aspect computation...");
        self.monitor.log_stats("Start");

        // Extract
        tracing::info!("📥 Computing daily positions...");
        let positions = self.pipeline.extract().await?;
        tracing::info!("📥 Computed positions for {} days", positions.len());
        self.monitor.log_stats("Extract");

        // Transform
        tracing::info!("🔄 Detecting aspects and patterns...");
        let result = self.pipeline.transform(positions).await?;
        tracing::info!(
            "🔄 Found {} aspects and {} patterns",
            result.aspect_count,
            result.pattern_count
        );
        self.monitor.log_stats("Transform");

        // Load
        tracing::info!("💾 Writing report...");
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("💾 Output saved to: {}", output_path);
        self.monitor.log_stats("Load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DailyPositions, TransformResult, WeeklyReport};
    use crate::utils::error::AspectError;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPipeline {
        loads: AtomicUsize,
        fail_transform: bool,
    }

    #[async_trait::async_trait]
    impl Pipeline for CountingPipeline {
        async fn extract(&self) -> Result<Vec<DailyPositions>> {
            Ok(vec![DailyPositions {
                date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                bodies: BTreeMap::new(),
            }])
        }

        async fn transform(&self, data: Vec<DailyPositions>) -> Result<TransformResult> {
            if self.fail_transform {
                return Err(AspectError::ProcessingError {
                    message: "boom".to_string(),
                });
            }
            assert_eq!(data.len(), 1);
            Ok(TransformResult {
                report: WeeklyReport::default(),
                aspect_count: 0,
                pattern_count: 0,
            })
        }

        async fn load(&self, _result: TransformResult) -> Result<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok("out/weekly_aspects.json".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_returns_output_path() {
        let engine = EtlEngine::new(CountingPipeline {
            loads: AtomicUsize::new(0),
            fail_transform: false,
        });
        let path = engine.run().await.unwrap();
        assert_eq!(path, "out/weekly_aspects.json");
        assert_eq!(engine.pipeline().loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_stops_before_load_on_failure() {
        let engine = EtlEngine::new_with_monitoring(
            CountingPipeline {
                loads: AtomicUsize::new(0),
                fail_transform: true,
            },
            true,
        );
        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, AspectError::ProcessingError { .. }));
        assert_eq!(engine.pipeline().loads.load(Ordering::SeqCst), 0);
    }
}
