//! Module orchestration -- assembly, lifecycle, and signal handling.
//!
//! The [`Orchestrator`] loads configuration, builds enabled modules,
//! manages ordered startup/shutdown, and blocks in the main loop until
//! a termination signal arrives.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use scorewatch_core::config::ScorewatchConfig;
use scorewatch_core::metrics as m;
use scorewatch_core::plugin::PluginRegistry;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;
use crate::modules;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: ScorewatchConfig,
    /// Registry of all modules (ordered for start/stop).
    plugins: PluginRegistry,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from disk and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = ScorewatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Useful for testing or when CLI overrides were applied first.
    pub fn build_from_config(config: ScorewatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before module initialization
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let mut plugins = PluginRegistry::new();

        if let Some(ingest) = modules::ingest::init(&config)? {
            plugins
                .register(ingest)
                .map_err(|e| anyhow::anyhow!("failed to register ingest: {}", e))?;
        }

        if config.metrics.enabled {
            record_build_info();
        }

        tracing::info!(modules = plugins.count(), "orchestrator initialized");

        Ok(Self {
            config,
            plugins,
            start_time: Instant::now(),
        })
    }

    /// Start all modules and block until a shutdown signal arrives.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        if !self.config.general.pid_file.is_empty() {
            write_pid_file(Path::new(&self.config.general.pid_file))?;
        }

        tracing::info!("initializing all modules");
        if let Err(e) = self.plugins.init_all().await {
            tracing::error!(error = %e, "module initialization failed");
            self.cleanup_pid_file();
            return Err(e.into());
        }

        tracing::info!("starting all modules");
        if let Err(e) = self.plugins.start_all().await {
            tracing::warn!("startup failed, stopping already-started modules");
            if let Err(stop_err) = self.plugins.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup cleanup"
                );
            }
            self.cleanup_pid_file();
            return Err(e.into());
        }

        tracing::info!("scorewatch-daemon running");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal, "shutdown signal received");

        let result = self.plugins.stop_all().await;
        self.cleanup_pid_file();
        result.map_err(|e| anyhow::anyhow!("shutdown failed: {}", e))?;

        tracing::info!("scorewatch-daemon shut down");
        Ok(())
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let statuses = self.plugins.health_check_all().await;
        let modules: Vec<ModuleHealth> = statuses
            .into_iter()
            .map(|(name, _state, status)| ModuleHealth {
                name,
                enabled: true,
                status,
            })
            .collect();

        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs,
            modules,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &ScorewatchConfig {
        &self.config
    }

    fn cleanup_pid_file(&self) {
        if !self.config.general.pid_file.is_empty() {
            remove_pid_file(Path::new(&self.config.general.pid_file));
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Write the current process PID to a file.
///
/// Only one consumer process may own a source at a time; the PID file
/// is the operational guard for that invariant.
///
/// - `create_new(true)` creates the file atomically (no TOCTOU window)
/// - the created file must be a regular file
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record build info metrics (always 1, with version label).
fn record_build_info() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn write_pid_file_creates_parent_directory() {
        let temp = tempfile::tempdir().unwrap();
        let pid_file = temp.path().join("subdir").join("test.pid");

        write_pid_file(&pid_file).unwrap();

        let content = fs::read_to_string(&pid_file).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn write_pid_file_fails_if_already_exists() {
        let temp = tempfile::tempdir().unwrap();
        let pid_file = temp.path().join("dup.pid");
        fs::write(&pid_file, "12345").unwrap();

        let err = write_pid_file(&pid_file).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("already exists"));
        assert!(msg.contains("12345"));
    }

    #[test]
    fn remove_pid_file_handles_nonexistent_gracefully() {
        let temp = tempfile::tempdir().unwrap();
        remove_pid_file(&temp.path().join("nonexistent.pid"));
    }

    #[tokio::test]
    async fn orchestrator_health_reflects_registered_modules() {
        let mut config = ScorewatchConfig::default();
        config.ingest.enabled = false; // 파일 시스템 의존 없이 조립

        let orchestrator = Orchestrator::build_from_config(config).unwrap();
        let health = orchestrator.health().await;
        assert!(health.modules.is_empty());
        assert!(health.status.is_healthy());
    }

    #[tokio::test]
    async fn orchestrator_registers_ingest_when_enabled() {
        let config = ScorewatchConfig::default();
        let orchestrator = Orchestrator::build_from_config(config).unwrap();
        let health = orchestrator.health().await;
        assert_eq!(health.modules.len(), 1);
        assert_eq!(health.modules[0].name, "ingest");
    }
}
