use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use weekly_aspects::core::ConfigProvider;
use weekly_aspects::utils::validation::Validate;
use weekly_aspects::{
    AspectJob, AspectPipeline, EtlEngine, GitPublisher, JobConfig, LocalStorage, PublishStatus,
};

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A site repository on `main` with a bare `origin`, like a CI checkout.
fn checkout() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let root = TempDir::new().unwrap();
    let origin = root.path().join("origin.git");
    let work = root.path().join("site");
    std::fs::create_dir_all(&origin).unwrap();
    std::fs::create_dir_all(work.join("data")).unwrap();

    git(&origin, &["init", "--bare", "-q"]);
    git(&origin, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&work, &["init", "-q"]);
    git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&work, &["remote", "add", "origin", origin.to_str().unwrap()]);
    std::fs::write(work.join("index.html"), "<h1>aspects</h1>\n").unwrap();
    git(&work, &["add", "index.html"]);
    git(
        &work,
        &["-c", "user.name=site", "-c", "user.email=site@example.com", "commit", "-q", "-m", "site"],
    );
    git(&work, &["push", "-q", "origin", "main"]);

    (root, work, origin)
}

fn job_config(work: &Path, start_date: &str) -> JobConfig {
    let toml_content = format!(
        r#"
[job]
name = "publish-test"

[window]
days = 2
start_date = "{start_date}"

[output]
path = "{output}"
filename = "weekly_aspects.json"
formats = ["json"]

[publish]
enabled = true
repo_path = "{repo}"
branch = "main"
message = "Update weekly aspects"
"#,
        start_date = start_date,
        output = work.join("data").display(),
        repo = work.display(),
    );
    let config = JobConfig::from_toml_str(&toml_content).unwrap();
    config.validate().unwrap();
    config
}

async fn run(config: JobConfig) -> PublishStatus {
    let publish_config = config.publish_config().unwrap();
    let storage = LocalStorage::new(config.output_path().to_string());
    let engine = EtlEngine::new(AspectPipeline::new(storage, config));
    let job = AspectJob::new(engine).with_publisher(Box::new(GitPublisher::new(publish_config)));
    job.run().await.unwrap().publish
}

#[tokio::test]
async fn test_first_run_commits_and_second_run_is_a_no_op() {
    let (_root, work, origin) = checkout();

    let first = run(job_config(&work, "2026-03-20")).await;
    let PublishStatus::Published { commit } = first else {
        panic!("expected a published commit, got {:?}", first);
    };
    assert_eq!(git(&origin, &["rev-parse", "refs/heads/main"]), commit);
    assert_eq!(
        git(&work, &["show", "--name-only", "--format=", "HEAD"]),
        "data/weekly_aspects.json"
    );

    // 同一個視窗重算，內容不變
    let second = run(job_config(&work, "2026-03-20")).await;
    assert_eq!(second, PublishStatus::NothingToCommit);
    assert_eq!(git(&origin, &["rev-parse", "refs/heads/main"]), commit);
    assert_eq!(git(&work, &["rev-list", "--count", "HEAD"]), "2");
}

#[tokio::test]
async fn test_new_window_produces_new_commit() {
    let (_root, work, origin) = checkout();

    let first = run(job_config(&work, "2026-03-20")).await;
    let second = run(job_config(&work, "2026-03-21")).await;

    let (PublishStatus::Published { commit: a }, PublishStatus::Published { commit: b }) =
        (first, second)
    else {
        panic!("both runs should publish");
    };
    assert_ne!(a, b);
    assert_eq!(git(&origin, &["rev-parse", "refs/heads/main"]), b);
    assert_eq!(git(&work, &["log", "-1", "--format=%s"]), "Update weekly aspects");
}
