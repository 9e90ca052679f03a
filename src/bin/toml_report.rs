use anyhow::Context;
use clap::Parser;
use intermarket::core::ConfigProvider;
use intermarket::utils::error::ErrorSeverity;
use intermarket::utils::{logger, validation::Validate};
use intermarket::{LocalStorage, ReportEngine, ReportPipeline, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-report")]
#[command(about = "Inter-market report driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "intermarket.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show what would be analyzed without fetching prices
    #[arg(long)]
    dry_run: bool,
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    let settings = config.source_settings();
    tracing::info!("📋 Report: {}", config.report_name());
    tracing::info!("   Symbols: {}", config.symbols().join(", "));
    tracing::info!(
        "   Window: {} days, threshold: {}",
        config.window(),
        config.correlation_threshold()
    );
    match &settings.data_dir {
        Some(dir) => tracing::info!("   Source: {:?} ({})", settings.kind, dir),
        None => tracing::info!("   Source: {:?} ({})", settings.kind, settings.endpoint),
    }
    if !config.spillover_targets().is_empty() {
        tracing::info!(
            "   Spillover targets: {}",
            config.spillover_targets().join(", ")
        );
    }
    tracing::info!(
        "   Output: {} [{}]{}",
        config.output_path(),
        config.output_formats().join(", "),
        if config.compress_output() { " (zip)" } else { "" }
    );
    if args.verbose {
        tracing::debug!("Full configuration: {:?}", config);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 先載入配置，才知道要用哪種日誌格式
    let config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config file '{}'", args.config))?;

    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting TOML-based inter-market report");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No prices will be fetched");
        println!(
            "Would analyze {} symbols over {} days into {}",
            config.symbols().len(),
            config.window(),
            config.output_path()
        );
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 Stage monitoring enabled");
    }

    let source = config
        .source_settings()
        .build()
        .context("Failed to build price source")?;
    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = ReportPipeline::new(source, storage, config);
    let engine = ReportEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Report completed successfully!");
            println!("✅ Report completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Report failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
