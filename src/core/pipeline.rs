use crate::core::aspects::{aspect_counts, calculate_aspects};
use crate::core::ephemeris::{daily_state, AnalyticEphemeris};
use crate::core::patterns::detect_patterns;
use crate::core::{ConfigProvider, Ephemeris, Pipeline, Storage};
use crate::domain::model::{
    DailyAspects, DailyPositions, OutputFormat, TransformResult, WeeklyReport,
};
use crate::utils::error::{AspectError, Result};
use chrono::{Days, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::path::Path;

/// Computes a window of daily aspects and writes the report through a
/// [`Storage`].
pub struct AspectPipeline<S: Storage, C: ConfigProvider, E: Ephemeris> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) ephemeris: E,
}

impl<S: Storage, C: ConfigProvider> AspectPipeline<S, C, AnalyticEphemeris> {
    pub fn new(storage: S, config: C) -> Self {
        let settings = config.aspect_settings();
        let ephemeris = AnalyticEphemeris::new(settings.frame, settings.observer);
        Self {
            storage,
            config,
            ephemeris,
        }
    }
}

impl<S: Storage, C: ConfigProvider, E: Ephemeris> AspectPipeline<S, C, E> {
    pub fn with_ephemeris(storage: S, config: C, ephemeris: E) -> Self {
        Self {
            storage,
            config,
            ephemeris,
        }
    }

    /// Dates covered by this run.
    pub fn window(&self) -> Result<Vec<NaiveDate>> {
        let start = self
            .config
            .start_date()
            .unwrap_or_else(|| Utc::now().date_naive());
        (0..self.config.days())
            .map(|offset| {
                start
                    .checked_add_days(Days::new(offset as u64))
                    .ok_or_else(|| AspectError::EphemerisError {
                        message: format!("{} + {} days is not a valid date", start, offset),
                    })
            })
            .collect()
    }

    fn csv_filename(&self) -> String {
        Path::new(self.config.output_filename())
            .with_extension("csv")
            .to_string_lossy()
            .into_owned()
    }
}

/// Flat one-row-per-aspect view of the report.
pub fn render_csv(report: &WeeklyReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "date",
        "body1",
        "body2",
        "aspect_name",
        "family",
        "vibe",
        "angle_measured_deg",
        "orb_deg",
        "phase",
        "out_of_sign",
        "importance_score",
    ])?;

    for day in &report.weekly_aspects {
        let date = day.date.format("%Y-%m-%d").to_string();
        for aspect in &day.aspects {
            let vibe = serde_json::to_value(aspect.vibe)?;
            let phase = serde_json::to_value(aspect.phase)?;
            let record = vec![
                date.clone(),
                aspect.body1.name().to_string(),
                aspect.body2.name().to_string(),
                aspect.aspect_name.name().to_string(),
                aspect.family.clone(),
                vibe.as_str().unwrap_or_default().to_string(),
                aspect.angle_measured_deg.to_string(),
                aspect.orb_deg.to_string(),
                phase.as_str().unwrap_or_default().to_string(),
                aspect.out_of_sign.to_string(),
                aspect.importance_score.to_string(),
            ];
            writer.write_record(&record)?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| AspectError::ProcessingError {
        message: format!("Failed to flush CSV writer: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| AspectError::ProcessingError {
        message: format!("CSV output is not UTF-8: {}", e),
    })
}

/// Serializes the report with four-space indentation.
pub fn render_json(report: &WeeklyReport) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    serde::Serialize::serialize(report, &mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Reads back a written report and renders it with two-space indentation
/// for printing.
pub async fn stdout_report<S: Storage>(storage: &S, filename: &str) -> Result<String> {
    let bytes = storage.read_file(filename).await?;
    let report: WeeklyReport = serde_json::from_slice(&bytes)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, E: Ephemeris> Pipeline for AspectPipeline<S, C, E> {
    async fn extract(&self) -> Result<Vec<DailyPositions>> {
        let bodies = self.config.aspect_settings().bodies();
        let mut days = Vec::new();

        for date in self.window()? {
            let mut states = BTreeMap::new();
            for &body in &bodies {
                let state = daily_state(&self.ephemeris, body, date)?;
                tracing::debug!(
                    "{} {}: lon {:.3}, speed {:.3} deg/day",
                    date,
                    body,
                    state.longitude_deg,
                    state.speed_deg_per_day
                );
                states.insert(body, state);
            }
            days.push(DailyPositions {
                date,
                bodies: states,
            });
        }

        Ok(days)
    }

    async fn transform(&self, data: Vec<DailyPositions>) -> Result<TransformResult> {
        let settings = self.config.aspect_settings();
        let mut weekly_aspects = Vec::with_capacity(data.len());
        let mut aspect_count = 0;
        let mut pattern_count = 0;

        for day in data {
            let aspects = calculate_aspects(&day.bodies, settings);
            let patterns = detect_patterns(&aspects, settings);

            let counts: Vec<String> = aspect_counts(&aspects)
                .into_iter()
                .map(|(kind, n)| format!("{}={}", kind, n))
                .collect();
            let pattern_types: Vec<&str> =
                patterns.iter().map(|p| p.pattern_type.label()).collect();
            tracing::info!(
                "{} Aspect counts: [{}] | Patterns: {:?}",
                day.date.format("%Y-%m-%d"),
                counts.join(", "),
                pattern_types
            );

            aspect_count += aspects.len();
            pattern_count += patterns.len();
            weekly_aspects.push(DailyAspects {
                date: day.date,
                aspects,
                patterns,
            });
        }

        Ok(TransformResult {
            report: WeeklyReport { weekly_aspects },
            aspect_count,
            pattern_count,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let filename = self.config.output_filename();
        let output_path = Path::new(self.config.output_path())
            .join(filename)
            .to_string_lossy()
            .into_owned();

        for format in self.config.output_formats() {
            match format {
                OutputFormat::Json => {
                    let json = render_json(&result.report)?;
                    tracing::debug!("Writing {} ({} bytes)", filename, json.len());
                    self.storage.write_file(filename, &json).await?;
                }
                OutputFormat::Csv => {
                    let csv_name = self.csv_filename();
                    let csv = render_csv(&result.report)?;
                    tracing::debug!("Writing {} ({} bytes)", csv_name, csv.len());
                    self.storage.write_file(&csv_name, csv.as_bytes()).await?;
                }
            }
        }

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AspectSettings, Body};
    use chrono::{DateTime, Timelike};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                AspectError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        output_formats: Vec<OutputFormat>,
        start_date: Option<NaiveDate>,
        days: usize,
        settings: AspectSettings,
    }

    impl MockConfig {
        fn new(days: usize) -> Self {
            Self {
                output_formats: vec![OutputFormat::Json],
                start_date: NaiveDate::from_ymd_opt(2026, 3, 1),
                days,
                settings: AspectSettings::default(),
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn output_path(&self) -> &str {
            "test_output"
        }

        fn output_filename(&self) -> &str {
            "weekly_aspects.json"
        }

        fn output_formats(&self) -> &[OutputFormat] {
            &self.output_formats
        }

        fn start_date(&self) -> Option<NaiveDate> {
            self.start_date
        }

        fn days(&self) -> usize {
            self.days
        }

        fn aspect_settings(&self) -> &AspectSettings {
            &self.settings
        }
    }

    /// Bodies parked on a T-square at midnight, drifting one degree by noon.
    struct FixedSky;

    impl Ephemeris for FixedSky {
        fn longitude(&self, body: Body, at: DateTime<Utc>) -> Result<f64> {
            let base = match body {
                Body::Mars => 10.0,
                Body::Jupiter => 190.0,
                Body::Saturn => 100.0,
                Body::Sun => 250.0,
                Body::Moon => 300.0,
                Body::Mercury => 262.0,
                Body::Venus => 330.0,
                Body::Uranus => 57.0,
                Body::Neptune => 357.0,
            };
            let drift = if at.hour() == 12 { 0.5 } else { 0.0 };
            Ok(base + drift)
        }
    }

    fn pipeline(config: MockConfig) -> AspectPipeline<MockStorage, MockConfig, FixedSky> {
        AspectPipeline::with_ephemeris(MockStorage::new(), config, FixedSky)
    }

    #[tokio::test]
    async fn test_extract_covers_window_and_bodies() {
        let pipeline = pipeline(MockConfig::new(7));
        let days = pipeline.extract().await.unwrap();

        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(days[6].date, NaiveDate::from_ymd_opt(2026, 3, 7).unwrap());
        assert_eq!(days[0].bodies.len(), 9);
        let mars = days[0].bodies[&Body::Mars];
        assert!((mars.longitude_deg - 10.0).abs() < 1e-9);
        assert!((mars.speed_deg_per_day - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_extract_without_luminaries() {
        let mut config = MockConfig::new(1);
        config.settings.include_sun_moon = false;
        let days = pipeline(config).extract().await.unwrap();
        assert_eq!(days[0].bodies.len(), 7);
        assert!(!days[0].bodies.contains_key(&Body::Sun));
    }

    #[tokio::test]
    async fn test_transform_finds_tsquare() {
        let pipeline = pipeline(MockConfig::new(2));
        let days = pipeline.extract().await.unwrap();
        let result = pipeline.transform(days).await.unwrap();

        assert_eq!(result.report.weekly_aspects.len(), 2);
        let first = &result.report.weekly_aspects[0];
        assert!(first
            .patterns
            .iter()
            .any(|p| p.pattern_type == crate::domain::model::PatternKind::TSquare));
        assert_eq!(
            result.aspect_count,
            result
                .report
                .weekly_aspects
                .iter()
                .map(|d| d.aspects.len())
                .sum::<usize>()
        );
        assert!(result.pattern_count >= 2);
    }

    #[tokio::test]
    async fn test_transform_with_empty_window() {
        let pipeline = pipeline(MockConfig::new(0));
        let result = pipeline.transform(Vec::new()).await.unwrap();
        assert!(result.report.weekly_aspects.is_empty());
        assert_eq!(result.aspect_count, 0);
    }

    #[tokio::test]
    async fn test_load_writes_four_space_json() {
        let pipeline = pipeline(MockConfig::new(1));
        let days = pipeline.extract().await.unwrap();
        let result = pipeline.transform(days).await.unwrap();
        let output_path = pipeline.load(result).await.unwrap();

        assert_eq!(
            output_path,
            Path::new("test_output")
                .join("weekly_aspects.json")
                .to_string_lossy()
        );

        let bytes = pipeline.storage.get_file("weekly_aspects.json").await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\n    \"weekly_aspects\": ["));
        assert!(text.contains("\"date\": \"2026-03-01\""));

        let parsed: WeeklyReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.weekly_aspects.len(), 1);
        assert!(pipeline.storage.get_file("weekly_aspects.csv").await.is_none());
    }

    #[tokio::test]
    async fn test_window_past_last_representable_date_is_an_error() {
        let mut config = MockConfig::new(3);
        config.start_date = NaiveDate::MAX.pred_opt();
        let pipeline = pipeline(config);

        let err = pipeline.window().unwrap_err();
        assert!(matches!(err, AspectError::EphemerisError { .. }));
        assert!(matches!(
            pipeline.extract().await,
            Err(AspectError::EphemerisError { .. })
        ));
    }

    #[tokio::test]
    async fn test_stdout_report_uses_two_space_indent() {
        let pipeline = pipeline(MockConfig::new(1));
        let days = pipeline.extract().await.unwrap();
        let result = pipeline.transform(days).await.unwrap();
        let aspect_count = result.aspect_count;
        pipeline.load(result).await.unwrap();

        let text = stdout_report(&pipeline.storage, "weekly_aspects.json")
            .await
            .unwrap();
        assert!(text.starts_with("{\n  \"weekly_aspects\": [\n    {\n"));
        let parsed: WeeklyReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.weekly_aspects.len(), 1);
        assert_eq!(parsed.weekly_aspects[0].aspects.len(), aspect_count);

        assert!(stdout_report(&pipeline.storage, "missing.json").await.is_err());
    }

    #[tokio::test]
    async fn test_load_writes_csv_when_requested() {
        let mut config = MockConfig::new(1);
        config.output_formats = vec![OutputFormat::Json, OutputFormat::Csv];
        let pipeline = pipeline(config);
        let days = pipeline.extract().await.unwrap();
        let result = pipeline.transform(days).await.unwrap();
        let aspect_count = result.aspect_count;
        pipeline.load(result).await.unwrap();

        let csv = pipeline.storage.get_file("weekly_aspects.csv").await.unwrap();
        let text = String::from_utf8(csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), aspect_count + 1);
        assert!(lines[0].starts_with("date,body1,body2,aspect_name"));
        assert!(lines[1].starts_with("2026-03-01,"));
    }
}
