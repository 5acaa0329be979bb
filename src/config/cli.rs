use crate::core::publish::GitPublishConfig;
use crate::core::{ConfigProvider, Storage};
use crate::domain::model::{AspectSettings, EclipticFrame, OutputFormat};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_name, validate_non_empty_string, validate_path, validate_range, validate_remote,
    validate_window, Validate,
};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "weekly-aspects")]
#[command(about = "Compute a week of planetary aspects and optionally publish the report")]
pub struct CliConfig {
    /// Directory the report is written to
    #[arg(long, default_value = ".")]
    pub output_path: String,

    #[arg(long, default_value = "weekly_aspects.json")]
    pub output_filename: String,

    /// Number of consecutive days to compute
    #[arg(long, default_value = "7")]
    pub days: usize,

    /// First day of the window (YYYY-MM-DD, defaults to today in UTC)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Leave the Sun and Moon out of the calculation
    #[arg(long)]
    pub no_sun_moon: bool,

    /// Ecliptic frame: j2000 or of-date
    #[arg(long, default_value = "j2000")]
    pub frame: EclipticFrame,

    /// Also write a CSV file next to the JSON report
    #[arg(long)]
    pub csv: bool,

    /// Commit and push the report after writing it
    #[arg(long)]
    pub publish: bool,

    /// Git work tree to commit into
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    #[arg(long, default_value = "origin")]
    pub remote: String,

    /// Branch to push to (defaults to the current branch)
    #[arg(long)]
    pub branch: Option<String>,

    #[arg(long, default_value = "Update weekly aspects")]
    pub commit_message: String,

    /// Environment variable holding the push token
    #[arg(long)]
    pub token_env: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,

    /// Print the report to stdout after writing it
    #[arg(long)]
    pub stdout: bool,

    #[arg(skip)]
    settings: AspectSettings,

    #[arg(skip)]
    formats: Vec<OutputFormat>,
}

impl CliConfig {
    /// Parses the process arguments and derives the aspect settings.
    pub fn from_args() -> Self {
        Self::parse().resolved()
    }

    /// Recomputes the settings that depend on flags.
    pub fn resolved(mut self) -> Self {
        self.settings = AspectSettings {
            include_sun_moon: !self.no_sun_moon,
            frame: self.frame,
            ..AspectSettings::default()
        };
        self.formats = if self.csv {
            vec![OutputFormat::Json, OutputFormat::Csv]
        } else {
            vec![OutputFormat::Json]
        };
        self
    }

    pub fn publish_config(&self) -> Option<GitPublishConfig> {
        if !self.publish {
            return None;
        }
        Some(GitPublishConfig {
            repo_path: self.repo.clone(),
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            message: self.commit_message.clone(),
            token_env: self.token_env.clone(),
            ..GitPublishConfig::default()
        })
    }
}

impl ConfigProvider for CliConfig {
    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_filename(&self) -> &str {
        &self.output_filename
    }

    fn output_formats(&self) -> &[OutputFormat] {
        &self.formats
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

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("output_path", &self.output_path)?;
        validate_file_name("output_filename", &self.output_filename, "json")?;
        validate_range("days", self.days, 1, 366)?;
        validate_window("start_date", self.start_date, self.days)?;

        if self.publish {
            validate_path("repo", &self.repo.to_string_lossy())?;
            validate_remote("remote", &self.remote)?;
            validate_non_empty_string("commit_message", &self.commit_message)?;
            if let Some(branch) = &self.branch {
                validate_non_empty_string("branch", branch)?;
            }
            if let Some(var) = &self.token_env {
                validate_non_empty_string("token_env", var)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}
