//! Configuration loading integration tests.
//!
//! Exercises the full TOML -> struct -> validation -> env override path
//! the daemon uses at startup.

use serial_test::serial;

use scorewatch_core::config::ScorewatchConfig;

#[tokio::test]
async fn load_full_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scorewatch.toml");
    tokio::fs::write(
        &path,
        r#"
        [general]
        log_level = "debug"
        log_format = "pretty"
        state_dir = "/var/lib/scorewatch"
        pid_file = "/run/scorewatch.pid"

        [ingest]
        enabled = true
        watch_paths = ["/var/log/game/arena1.log"]
        poll_interval_ms = 100
        queue_depth = 2048

        [metrics]
        enabled = true
        listen_addr = "127.0.0.1"
        port = 9184
        endpoint = "/metrics"
        "#,
    )
    .await
    .unwrap();

    let config = ScorewatchConfig::from_file(&path).await.unwrap();
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.pid_file, "/run/scorewatch.pid");
    assert_eq!(config.ingest.queue_depth, 2048);
    assert!(config.metrics.enabled);
}

#[tokio::test]
async fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ScorewatchConfig::from_file(dir.path().join("absent.toml")).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn partial_config_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scorewatch.toml");
    tokio::fs::write(&path, "[general]\nlog_level = \"warn\"\n")
        .await
        .unwrap();

    let config = ScorewatchConfig::from_file(&path).await.unwrap();
    assert_eq!(config.general.log_level, "warn");
    // 생략된 섹션은 기본값
    assert_eq!(config.ingest.poll_interval_ms, 150);
    assert!(!config.metrics.enabled);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scorewatch.toml");
    tokio::fs::write(&path, "[ingest]\npoll_interval_ms = 0\n")
        .await
        .unwrap();

    assert!(ScorewatchConfig::from_file(&path).await.is_err());
}

#[tokio::test]
#[serial]
async fn env_overrides_apply_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scorewatch.toml");
    tokio::fs::write(&path, "[general]\nlog_level = \"info\"\n")
        .await
        .unwrap();

    unsafe {
        std::env::set_var("SCOREWATCH_GENERAL_LOG_LEVEL", "trace");
        std::env::set_var("SCOREWATCH_INGEST_WATCH_PATHS", "/var/log/game/a.log");
    }
    let config = ScorewatchConfig::load(&path).await.unwrap();
    unsafe {
        std::env::remove_var("SCOREWATCH_GENERAL_LOG_LEVEL");
        std::env::remove_var("SCOREWATCH_INGEST_WATCH_PATHS");
    }

    assert_eq!(config.general.log_level, "trace");
    assert_eq!(config.ingest.watch_paths, vec!["/var/log/game/a.log"]);
}
