use chrono::{Days, Utc};
use clap::Parser;
use weekly_aspects::core::ConfigProvider;
use weekly_aspects::utils::{logger, validation::Validate};
use weekly_aspects::{
    AspectJob, AspectPipeline, EtlEngine, GitPublisher, JobConfig, JobOutcome, LocalStorage,
    PublishStatus, Result,
};

#[derive(Parser)]
#[command(name = "aspect-scheduler")]
#[command(about = "Run the weekly aspects job once a day at a fixed UTC time")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "aspects-job.toml")]
    config: String,

    /// Run the job immediately and exit (manual dispatch)
    #[arg(long)]
    once: bool,

    /// Show what would run without computing or publishing
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 載入 TOML 配置
    let config = match JobConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(e.exit_code());
        }
    };

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting aspect scheduler");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }
    let schedule = config.schedule()?;

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args, &schedule.to_string());

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config, &schedule)?;
        return Ok(());
    }

    // 決定監控設定
    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    if args.once {
        match run_job(&config, monitor_enabled).await {
            Ok(outcome) => report_outcome(&outcome),
            Err(e) => {
                log_failure(&e);
                eprintln!("❌ {}", e.user_friendly_message());
                std::process::exit(e.exit_code());
            }
        }
        return Ok(());
    }

    loop {
        let now = Utc::now();
        let next = schedule.next_run_after(now)?;
        tracing::info!("⏰ Next run at {}", next.format("%Y-%m-%d %H:%M UTC"));

        tokio::select! {
            _ = tokio::time::sleep(schedule.wait_from(now)?) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Received Ctrl-C, stopping scheduler");
                break;
            }
        }

        // 失敗只記錄，等下一個排程時間
        match run_job(&config, monitor_enabled).await {
            Ok(outcome) => report_outcome(&outcome),
            Err(e) => log_failure(&e),
        }
    }

    Ok(())
}

async fn run_job(config: &JobConfig, monitor_enabled: bool) -> Result<JobOutcome> {
    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = AspectPipeline::new(storage, config.clone());
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    let mut job = AspectJob::new(engine);
    if let Some(publish_config) = config.publish_config() {
        job = job.with_publisher(Box::new(GitPublisher::new(publish_config)));
    }
    job.run().await
}

fn report_outcome(outcome: &JobOutcome) {
    tracing::info!("📁 Output saved to: {}", outcome.output_path.display());
    match &outcome.publish {
        PublishStatus::Published { commit } => tracing::info!("🚀 Published commit {}", commit),
        PublishStatus::NothingToCommit => tracing::info!("✅ Nothing to commit"),
        PublishStatus::Skipped => tracing::info!("⏭️ Publishing disabled"),
    }
}

fn log_failure(e: &weekly_aspects::AspectError) {
    tracing::error!(
        "❌ Aspect job failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
}

fn display_config_summary(config: &JobConfig, args: &Args, schedule: &str) {
    let settings = config.aspect_settings();
    println!("📋 Configuration Summary:");
    println!("  Job: {}", config.job.name);
    if let Some(description) = &config.job.description {
        println!("  Description: {}", description);
    }
    println!("  Schedule: daily at {}", schedule);
    println!("  Window: {} days", config.days());
    println!("  Include Sun/Moon: {}", settings.include_sun_moon);
    println!("  Frame: {:?}", settings.frame);
    println!(
        "  Output: {}/{}",
        config.output_path(),
        config.output_filename()
    );
    println!("  Formats: {}", config.output.formats.join(", "));

    match config.publish_config() {
        Some(publish) => println!(
            "  Publish: {} → {}{}",
            publish.repo_path.display(),
            publish.remote,
            publish
                .branch
                .map(|b| format!(" ({})", b))
                .unwrap_or_default()
        ),
        None => println!("  Publish: disabled"),
    }

    if args.once {
        println!("  ▶️ ONE-SHOT RUN");
    }
    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
}

fn perform_dry_run(
    config: &JobConfig,
    schedule: &weekly_aspects::DailySchedule,
) -> anyhow::Result<()> {
    let start = config
        .start_date()
        .unwrap_or_else(|| Utc::now().date_naive());
    let end = start
        .checked_add_days(Days::new(config.days().saturating_sub(1) as u64))
        .ok_or_else(|| anyhow::anyhow!("{} + {} days is not a valid date", start, config.days()))?;

    println!("🔍 Dry Run Analysis:");
    println!("  Next scheduled run: {}", schedule.next_run_after(Utc::now())?);
    println!("  Would compute {} through {}", start, end);
    println!(
        "  Bodies: {}",
        config
            .aspect_settings()
            .bodies()
            .iter()
            .map(|b| b.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Would write: {}/{}", config.output_path(), config.output_filename());
    if config.publish_config().is_some() {
        println!("  Would commit and push the report");
    }
    println!("✅ Dry run completed - configuration is valid");
    Ok(())
}
