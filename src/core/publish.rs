use crate::core::{PublishOutcome, Publisher};
use crate::utils::error::{AspectError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use url::Url;

/// Username GitHub expects alongside an installation or workflow token.
pub const TOKEN_USERNAME: &str = "x-access-token";

#[derive(Debug, Clone)]
pub struct GitPublishConfig {
    pub repo_path: PathBuf,
    /// Remote name or URL.
    pub remote: String,
    /// Target branch; `None` pushes the current branch to its namesake.
    pub branch: Option<String>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    /// Environment variable holding a push token for HTTPS remotes.
    pub token_env: Option<String>,
}

impl Default for GitPublishConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            remote: "origin".to_string(),
            branch: None,
            message: "Update weekly aspects".to_string(),
            author_name: "github-actions".to_string(),
            author_email: "github-actions@github.com".to_string(),
            token_env: None,
        }
    }
}

/// Commits the report into a git work tree and pushes it.
pub struct GitPublisher {
    config: GitPublishConfig,
}

impl GitPublisher {
    pub fn new(config: GitPublishConfig) -> Self {
        Self { config }
    }

    async fn git(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.config.repo_path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await?;
        Ok(output)
    }

    /// Runs git and fails on a non-zero exit, returning trimmed stdout.
    async fn git_checked(&self, command: &str, args: &[&str]) -> Result<String> {
        let output = self.git(args).await?;
        if !output.status.success() {
            return Err(command_error(command, &output, None));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn token(&self) -> Result<Option<String>> {
        let Some(var) = &self.config.token_env else {
            return Ok(None);
        };
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
            _ => Err(AspectError::MissingConfigError {
                field: format!("environment variable {}", var),
            }),
        }
    }

    /// Where to push: the configured remote, or its URL with the token
    /// embedded when one is configured and the remote speaks HTTP(S).
    /// Paths, scp-style and SSH remotes push unchanged.
    async fn push_target(&self, token: Option<&str>) -> Result<String> {
        let Some(token) = token else {
            return Ok(self.config.remote.clone());
        };

        let remote_url = if Url::parse(&self.config.remote).is_ok() {
            self.config.remote.clone()
        } else {
            self.git_checked("remote", &["remote", "get-url", &self.config.remote])
                .await?
        };

        match authenticated_url(&remote_url, token) {
            Some(url) => Ok(url),
            None => {
                tracing::warn!(
                    "⚠️ Remote '{}' is not HTTP(S); pushing without the token",
                    self.config.remote
                );
                Ok(self.config.remote.clone())
            }
        }
    }

    fn refspec(&self) -> String {
        match &self.config.branch {
            Some(branch) => format!("HEAD:refs/heads/{}", branch),
            None => "HEAD".to_string(),
        }
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, file: &Path) -> Result<PublishOutcome> {
        // git 以 repo 目錄為工作目錄執行，路徑要先轉成絕對路徑
        let file = tokio::fs::canonicalize(file).await?;
        let file = file.to_string_lossy().into_owned();
        // 先決定推送目標，設定有誤時不留下 commit
        let token = self.token()?;
        let target = self.push_target(token.as_deref()).await?;

        self.git_checked("add", &["add", "--", &file]).await?;

        let diff = self
            .git(&["diff", "--cached", "--quiet", "--", &file])
            .await?;
        match diff.status.code() {
            Some(0) => {
                tracing::info!("✅ Nothing to commit, {} is unchanged", file);
                return Ok(PublishOutcome::NothingToCommit);
            }
            Some(1) => {}
            _ => return Err(command_error("diff", &diff, None)),
        }

        let name = format!("user.name={}", self.config.author_name);
        let email = format!("user.email={}", self.config.author_email);
        self.git_checked(
            "commit",
            &[
                "-c",
                &name,
                "-c",
                &email,
                "commit",
                "-m",
                &self.config.message,
                "--",
                &file,
            ],
        )
        .await?;
        let commit = self.git_checked("rev-parse", &["rev-parse", "HEAD"]).await?;
        tracing::info!("📝 Committed {} as {}", file, commit);

        let refspec = self.refspec();
        let push = self.git(&["push", &target, &refspec]).await?;
        if !push.status.success() {
            return Err(command_error("push", &push, token.as_deref()));
        }
        tracing::info!("🚀 Pushed {} to {}", commit, self.config.remote);

        Ok(PublishOutcome::Published { commit })
    }
}

/// Embeds `token` as the password of an HTTP(S) remote URL. Anything else,
/// including local paths and `git@host:repo` remotes, yields `None`.
pub fn authenticated_url(remote_url: &str, token: &str) -> Option<String> {
    let mut url = Url::parse(remote_url).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_username(TOKEN_USERNAME).ok()?;
    url.set_password(Some(token)).ok()?;
    Some(url.to_string())
}

fn command_error(command: &str, output: &Output, secret: Option<&str>) -> AspectError {
    let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if let Some(secret) = secret {
        stderr = stderr.replace(secret, "***");
    }
    AspectError::GitCommandError {
        command: command.to_string(),
        exit_code: output.status.code().unwrap_or(-1),
        stderr,
    }
}
