use intermarket::utils::error::{AnalysisError, ErrorSeverity};
use intermarket::utils::{logger, validation::Validate};
use intermarket::{
    AnyPriceSource, CliConfig, InterMarketAnalyzer, LocalStorage, Mode, ReportEngine,
    ReportPipeline,
};
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> Result<(), AnalysisError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_failure(e: &AnalysisError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2, // 可重試
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}

fn build_analyzer(config: &CliConfig, source: AnyPriceSource) -> InterMarketAnalyzer<AnyPriceSource> {
    InterMarketAnalyzer::new(source)
        .with_window(config.window)
        .with_threshold(config.threshold)
        .with_volatility_lag(config.volatility_lag)
        .with_active_symbols(config.symbols.clone())
}

async fn run(config: CliConfig, source: AnyPriceSource) -> Result<(), AnalysisError> {
    let symbols = config.symbols.clone();

    match config.mode {
        Mode::Report => {
            let output_path = run_report(config, source).await?;
            tracing::info!("✅ Report completed successfully!");
            println!("✅ Report completed successfully!");
            println!("📁 Output saved to: {}", output_path);
            Ok(())
        }
        Mode::Correlations => {
            let analyzer = build_analyzer(&config, source);
            print_json(&analyzer.calculate_correlations(&symbols, None).await?)
        }
        Mode::Leaders => {
            let analyzer = build_analyzer(&config, source);
            let matrix = analyzer.calculate_correlations(&symbols, None).await?;
            print_json(&analyzer.identify_leaders(&matrix))
        }
        Mode::Spillover => {
            let target = config
                .symbol
                .as_deref()
                .ok_or_else(|| AnalysisError::MissingConfigError {
                    field: "symbol".to_string(),
                })?;
            let analyzer = build_analyzer(&config, source);
            let report = analyzer
                .detect_spillover(target, Some(symbols.as_slice()))
                .await?;
            print_json(&report)
        }
        Mode::Network => {
            let analyzer = build_analyzer(&config, source);
            print_json(&analyzer.get_market_network(&symbols).await?)
        }
        Mode::Regime => {
            let analyzer = build_analyzer(&config, source);
            print_json(&analyzer.analyze_market_regime(&symbols).await?)
        }
    }
}

async fn run_report(config: CliConfig, source: AnyPriceSource) -> Result<String, AnalysisError> {
    let storage = LocalStorage::new(config.output_path.clone());
    let monitor_enabled = config.monitor;
    let pipeline = ReportPipeline::new(source, storage, config);
    tracing::debug!("Report universe: {:?}", pipeline.analyzer().active_symbols());

    let engine = ReportEngine::new_with_monitoring(pipeline, monitor_enabled);
    engine.run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::load();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting intermarket CLI ({:?} mode)", config.mode);
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        report_failure(&e);
    }

    let source = match config.source_settings().build() {
        Ok(source) => source,
        Err(e) => report_failure(&e),
    };

    if config.monitor {
        tracing::info!("🔍 Stage monitoring enabled");
    }

    if let Err(e) = run(config, source).await {
        report_failure(&e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn write_prices(dir: &TempDir) {
        let closes = [
            ("EURUSD=X", [1.10, 1.11, 1.09, 1.12, 1.13]),
            ("GC=F", [2000.0, 2012.0, 1990.0, 2021.0, 2030.0]),
        ];
        for (symbol, values) in closes {
            let mut csv = String::from("date,close\n");
            for (i, close) in values.iter().enumerate() {
                csv.push_str(&format!("2024-03-0{},{}\n", i + 1, close));
            }
            std::fs::write(dir.path().join(format!("{}.csv", symbol)), csv).unwrap();
        }
    }

    fn config(dir: &TempDir, mode: &str) -> CliConfig {
        let data_dir = dir.path().to_string_lossy().to_string();
        let output = dir.path().join("out").to_string_lossy().to_string();
        CliConfig::parse_from([
            "intermarket",
            "--mode",
            mode,
            "--symbols",
            "EURUSD=X,GC=F",
            "--source",
            "csv",
            "--data-dir",
            data_dir.as_str(),
            "--output-path",
            output.as_str(),
            "--no-compress",
        ])
        .finalize()
    }

    #[tokio::test]
    async fn test_every_mode_dispatches() {
        let dir = TempDir::new().unwrap();
        write_prices(&dir);

        for mode in ["correlations", "leaders", "network", "regime", "report"] {
            let config = config(&dir, mode);
            let source = config.source_settings().build().unwrap();
            assert!(run(config, source).await.is_ok(), "mode {} failed", mode);
        }
        assert!(dir.path().join("out").join("report.json").exists());
    }
}
