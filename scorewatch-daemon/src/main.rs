use anyhow::Result;
use clap::Parser;

use scorewatch_core::config::ScorewatchConfig;
use scorewatch_daemon::cli::DaemonCli;
use scorewatch_daemon::logging;
use scorewatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드 + CLI 오버라이드 적용
    let mut config = ScorewatchConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config '{}': {}", cli.config.display(), e))?;

    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    if let Some(pid_file) = cli.pid_file {
        config.general.pid_file = pid_file;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration ok: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "scorewatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await
}
