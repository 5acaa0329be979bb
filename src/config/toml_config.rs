use crate::core::publish::GitPublishConfig;
use crate::core::schedule::DailySchedule;
use crate::core::ConfigProvider;
use crate::domain::model::{AspectKind, AspectSettings, Body, EclipticFrame, Observer, OutputFormat};
use crate::utils::error::{AspectError, Result};
use crate::utils::validation::{
    validate_file_name, validate_non_empty_string, validate_path, validate_range, validate_remote,
    validate_window, Validate,
};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Scheduler configuration (`aspects-job.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job: JobSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub aspects: AspectsSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub publish: PublishSection,
    pub monitoring: Option<MonitoringConfig>,

    // 以下由原始設定推導而來
    #[serde(skip)]
    settings: AspectSettings,
    #[serde(skip)]
    formats: Vec<OutputFormat>,
    #[serde(skip)]
    start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSection {
    /// Daily trigger, `HH:MM` in UTC.
    pub utc_time: String,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            utc_time: "00:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSection {
    pub days: usize,
    /// `YYYY-MM-DD`; today (UTC) when absent.
    pub start_date: Option<String>,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            days: 7,
            start_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AspectsSection {
    pub include_sun_moon: Option<bool>,
    pub default_orb_deg: Option<f64>,
    /// Per-kind orb overrides keyed by aspect name.
    pub orbs: Option<BTreeMap<String, f64>>,
    /// Per-body weight overrides keyed by body name.
    pub body_weights: Option<BTreeMap<String, f64>>,
    pub frame: Option<String>,
    pub observer_latitude_deg: Option<f64>,
    pub observer_longitude_deg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub path: String,
    pub filename: String,
    pub formats: Vec<String>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            path: ".".to_string(),
            filename: "weekly_aspects.json".to_string(),
            formats: vec!["json".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishSection {
    #[serde(default)]
    pub enabled: bool,
    pub repo_path: Option<String>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub message: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl JobConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let config: JobConfig =
            toml::from_str(&processed_content).map_err(|e| AspectError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        config.resolve()
    }

    /// 替換環境變數 (例如 ${GH_PAT})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
            AspectError::ConfigError {
                message: format!("Invalid substitution pattern: {}", e),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    /// Turns the name-keyed TOML tables into typed settings.
    fn resolve(mut self) -> Result<Self> {
        let defaults = AspectSettings::default();
        let section = &self.aspects;

        let mut orbs = defaults.orbs.clone();
        for (name, orb) in section.orbs.iter().flatten() {
            let kind: AspectKind = name.parse().map_err(|reason| invalid("aspects.orbs", name, reason))?;
            orbs.insert(kind, *orb);
        }

        let mut body_weights = defaults.body_weights.clone();
        for (name, weight) in section.body_weights.iter().flatten() {
            let body: Body = name
                .parse()
                .map_err(|reason| invalid("aspects.body_weights", name, reason))?;
            body_weights.insert(body, *weight);
        }

        let frame = match &section.frame {
            Some(frame) => frame
                .parse::<EclipticFrame>()
                .map_err(|reason| invalid("aspects.frame", frame, reason))?,
            None => defaults.frame,
        };

        let observer = Observer {
            latitude_deg: section.observer_latitude_deg.unwrap_or(defaults.observer.latitude_deg),
            longitude_deg: section
                .observer_longitude_deg
                .unwrap_or(defaults.observer.longitude_deg),
        };

        self.settings = AspectSettings {
            include_sun_moon: section.include_sun_moon.unwrap_or(defaults.include_sun_moon),
            default_orb_deg: section.default_orb_deg.unwrap_or(defaults.default_orb_deg),
            orbs,
            body_weights,
            frame,
            observer,
        };

        self.formats = self
            .output
            .formats
            .iter()
            .map(|format| {
                format
                    .parse::<OutputFormat>()
                    .map_err(|reason| invalid("output.formats", format, reason))
            })
            .collect::<Result<Vec<_>>>()?;

        self.start_date = match &self.window.start_date {
            Some(date) => Some(
                date.parse::<NaiveDate>()
                    .map_err(|e| invalid("window.start_date", date, e.to_string()))?,
            ),
            None => None,
        };

        Ok(self)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("job.name", &self.job.name)?;
        self.schedule()?;

        validate_range("window.days", self.window.days, 1, 366)?;
        validate_window("window.start_date", self.start_date, self.window.days)?;

        validate_path("output.path", &self.output.path)?;
        validate_file_name("output.filename", &self.output.filename, "json")?;
        if !self.formats.contains(&OutputFormat::Json) {
            return Err(AspectError::InvalidConfigValueError {
                field: "output.formats".to_string(),
                value: self.output.formats.join(", "),
                reason: "The JSON report is always written; include \"json\"".to_string(),
            });
        }

        let settings = &self.settings;
        validate_range("aspects.default_orb_deg", settings.default_orb_deg, 0.0, 30.0)?;
        for (kind, orb) in &settings.orbs {
            validate_range(&format!("aspects.orbs.{}", kind), *orb, 0.0, 30.0)?;
        }
        for (body, weight) in &settings.body_weights {
            validate_range(&format!("aspects.body_weights.{}", body), *weight, 0.0, 5.0)?;
        }
        validate_range(
            "aspects.observer_latitude_deg",
            settings.observer.latitude_deg,
            -90.0,
            90.0,
        )?;
        validate_range(
            "aspects.observer_longitude_deg",
            settings.observer.longitude_deg,
            -180.0,
            180.0,
        )?;

        if self.publish.enabled {
            let publish = self.git_publish_config();
            validate_path("publish.repo_path", &publish.repo_path.to_string_lossy())?;
            validate_remote("publish.remote", &publish.remote)?;
            validate_non_empty_string("publish.message", &publish.message)?;
            validate_non_empty_string("publish.author_name", &publish.author_name)?;
            validate_non_empty_string("publish.author_email", &publish.author_email)?;
            if let Some(branch) = &publish.branch {
                validate_non_empty_string("publish.branch", branch)?;
            }
            if let Some(var) = &publish.token_env {
                validate_non_empty_string("publish.token_env", var)?;
            }
        }

        Ok(())
    }

    pub fn schedule(&self) -> Result<DailySchedule> {
        self.schedule.utc_time.parse()
    }

    /// Git settings with defaults filled in, regardless of `enabled`.
    pub fn git_publish_config(&self) -> GitPublishConfig {
        let defaults = GitPublishConfig::default();
        let section = &self.publish;
        GitPublishConfig {
            repo_path: section
                .repo_path
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(defaults.repo_path),
            remote: section.remote.clone().unwrap_or(defaults.remote),
            branch: section.branch.clone(),
            message: section.message.clone().unwrap_or(defaults.message),
            author_name: section.author_name.clone().unwrap_or(defaults.author_name),
            author_email: section.author_email.clone().unwrap_or(defaults.author_email),
            token_env: section.token_env.clone(),
        }
    }

    /// Publish settings when publishing is enabled.
    pub fn publish_config(&self) -> Option<GitPublishConfig> {
        self.publish.enabled.then(|| self.git_publish_config())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

fn invalid(field: &str, value: &str, reason: impl Into<String>) -> AspectError {
    AspectError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

impl ConfigProvider for JobConfig {
    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn output_filename(&self) -> &str {
        &self.output.filename
    }

    fn output_formats(&self) -> &[OutputFormat] {
        &self.formats
    }

    fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    fn days(&self) -> usize {
        self.window.days
    }

    fn aspect_settings(&self) -> &AspectSettings {
        &self.settings
    }
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
