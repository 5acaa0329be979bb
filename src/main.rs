use weekly_aspects::core::pipeline::stdout_report;
use weekly_aspects::core::ConfigProvider;
use weekly_aspects::utils::{logger, validation::Validate};
use weekly_aspects::{
    AspectJob, AspectPipeline, CliConfig, EtlEngine, GitPublisher, LocalStorage, PublishStatus,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::from_args();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting weekly-aspects");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let print_report = config.stdout;
    let publish_config = config.publish_config();
    let filename = config.output_filename().to_string();

    // 建立存儲、管道與工作
    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = AspectPipeline::new(storage.clone(), config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    let mut job = AspectJob::new(engine);
    if let Some(publish_config) = publish_config {
        job = job.with_publisher(Box::new(GitPublisher::new(publish_config)));
    }

    match job.run().await {
        Ok(outcome) => {
            tracing::info!("✅ Aspect report completed successfully!");
            tracing::info!("📁 Output saved to: {}", outcome.output_path.display());
            println!("✅ Aspect report completed successfully!");
            println!("📁 Output saved to: {}", outcome.output_path.display());

            match &outcome.publish {
                PublishStatus::Published { commit } => println!("🚀 Published commit {}", commit),
                PublishStatus::NothingToCommit => println!("✅ Nothing to commit"),
                PublishStatus::Skipped => {}
            }

            if print_report {
                let report = stdout_report(&storage, &filename).await?;
                println!("{}", report);
            }
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Aspect job failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            std::process::exit(e.exit_code());
        }
    }

    Ok(())
}
