//! 인제스트 설정
//!
//! [`IngestConfig`]는 core의 [`IngestSection`](scorewatch_core::config::IngestSection)을
//! 기반으로 인제스트 전용 확장 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use scorewatch_core::config::ScorewatchConfig;
//! use scorewatch_ingest::config::IngestConfig;
//!
//! let core_config = ScorewatchConfig::default();
//! let config = IngestConfig::from_core(&core_config);
//! ```

use std::path::{Component, Path};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::markers;

/// 핸들러 실패 시 체크포인트 정책
///
/// 원 시스템의 전진 우선(at-least-once) 성향과 엄격한 재전달 보장
/// 사이의 실제 정책 선택이므로 하드코딩하지 않고 노출합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerFailurePolicy {
    /// 에러를 로깅하고 체크포인트를 전진 (기본값)
    #[default]
    Advance,
    /// 해당 소스의 워커를 실패 라인에서 정지 (체크포인트 동결)
    Halt,
}

/// 인제스트 설정
///
/// core의 `IngestSection`에서 파생되며, 인제스트 내부에서만 쓰는
/// 추가 설정을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 감시할 로그 파일 경로 목록
    pub watch_paths: Vec<String>,
    /// 체크포인트 상태 디렉토리
    pub state_dir: String,
    /// 새 데이터 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 소스당 디스패치 큐 깊이
    pub queue_depth: usize,

    // --- 확장 설정 (core 섹션에 없는 추가 필드) ---
    /// 정체성/크기 재검사 주기 (밀리초). 폴링보다 드물게 돌려
    /// 로테이션 감지 지연과 per-read 오버헤드를 분리합니다.
    pub identity_check_interval_ms: u64,
    /// 역방향 스캔 청크 크기 (바이트)
    pub scan_chunk_bytes: usize,
    /// 핸들러 실패 시 체크포인트 정책
    pub on_handler_error: HandlerFailurePolicy,
    /// 맵 전환 마커 패턴
    pub map_change_pattern: String,
    /// 서버 기동 마커 패턴
    pub server_start_pattern: String,
    /// "로그 시작" 스탬프 패턴
    pub log_opened_pattern: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            watch_paths: vec!["/var/log/game/server.log".to_owned()],
            state_dir: "/var/lib/scorewatch".to_owned(),
            poll_interval_ms: 150,
            queue_depth: 1024,
            identity_check_interval_ms: 1000,
            scan_chunk_bytes: 64 * 1024,
            on_handler_error: HandlerFailurePolicy::Advance,
            map_change_pattern: markers::DEFAULT_MAP_CHANGE_PATTERN.to_owned(),
            server_start_pattern: markers::DEFAULT_SERVER_START_PATTERN.to_owned(),
            log_opened_pattern: markers::DEFAULT_LOG_OPENED_PATTERN.to_owned(),
        }
    }
}

impl IngestConfig {
    /// core 설정에서 인제스트 설정을 생성합니다.
    ///
    /// core에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &scorewatch_core::config::ScorewatchConfig) -> Self {
        Self {
            enabled: core.ingest.enabled,
            watch_paths: core.ingest.watch_paths.clone(),
            state_dir: core.general.state_dir.clone(),
            poll_interval_ms: core.ingest.poll_interval_ms,
            queue_depth: core.ingest.queue_depth,
            ..Self::default()
        }
    }

    /// 폴링 주기를 Duration으로 반환합니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 정체성 재검사 주기를 Duration으로 반환합니다.
    pub fn identity_check_interval(&self) -> Duration {
        Duration::from_millis(self.identity_check_interval_ms)
    }

    /// 감시 경로가 안전한지 검증합니다.
    ///
    /// # 검증 규칙
    /// - 빈 경로 금지
    /// - ".." 컴포넌트 금지
    /// - 절대 경로만 허용
    fn validate_watch_path(path_str: &str) -> Result<(), IngestError> {
        if path_str.is_empty() {
            return Err(IngestError::Config {
                field: "watch_paths".to_owned(),
                reason: "watch path must not be empty".to_owned(),
            });
        }

        let path = Path::new(path_str);

        if path.components().any(|c| c == Component::ParentDir) {
            return Err(IngestError::Config {
                field: "watch_paths".to_owned(),
                reason: format!("watch path '{path_str}' contains path traversal pattern '..'"),
            });
        }

        if !path.is_absolute() {
            return Err(IngestError::Config {
                field: "watch_paths".to_owned(),
                reason: format!("watch path '{path_str}' must be an absolute path"),
            });
        }

        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        const MAX_QUEUE_DEPTH: usize = 1_000_000;
        const MIN_SCAN_CHUNK: usize = 512;
        const MAX_SCAN_CHUNK: usize = 16 * 1024 * 1024;

        if self.poll_interval_ms == 0 {
            return Err(IngestError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.identity_check_interval_ms == 0 {
            return Err(IngestError::Config {
                field: "identity_check_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.queue_depth == 0 || self.queue_depth > MAX_QUEUE_DEPTH {
            return Err(IngestError::Config {
                field: "queue_depth".to_owned(),
                reason: format!("must be 1-{MAX_QUEUE_DEPTH}"),
            });
        }

        if self.scan_chunk_bytes < MIN_SCAN_CHUNK || self.scan_chunk_bytes > MAX_SCAN_CHUNK {
            return Err(IngestError::Config {
                field: "scan_chunk_bytes".to_owned(),
                reason: format!("must be {MIN_SCAN_CHUNK}-{MAX_SCAN_CHUNK}"),
            });
        }

        if self.state_dir.is_empty() {
            return Err(IngestError::Config {
                field: "state_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.enabled && self.watch_paths.is_empty() {
            return Err(IngestError::Config {
                field: "watch_paths".to_owned(),
                reason: "at least one watch path is required when enabled".to_owned(),
            });
        }

        for path in &self.watch_paths {
            Self::validate_watch_path(path)?;
        }

        // 마커 패턴은 여기서 먼저 걸러 시작 후 실패를 막음
        markers::RegexMarkers::new(
            &self.map_change_pattern,
            &self.server_start_pattern,
            &self.log_opened_pattern,
        )?;

        Ok(())
    }
}

/// 인제스트 설정 빌더
#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 감시 경로를 설정합니다.
    pub fn watch_paths(mut self, paths: Vec<String>) -> Self {
        self.config.watch_paths = paths;
        self
    }

    /// 상태 디렉토리를 설정합니다.
    pub fn state_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.state_dir = dir.into();
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 정체성 재검사 주기(밀리초)를 설정합니다.
    pub fn identity_check_interval_ms(mut self, ms: u64) -> Self {
        self.config.identity_check_interval_ms = ms;
        self
    }

    /// 큐 깊이를 설정합니다.
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.config.queue_depth = depth;
        self
    }

    /// 역방향 스캔 청크 크기를 설정합니다.
    pub fn scan_chunk_bytes(mut self, bytes: usize) -> Self {
        self.config.scan_chunk_bytes = bytes;
        self
    }

    /// 핸들러 실패 정책을 설정합니다.
    pub fn on_handler_error(mut self, policy: HandlerFailurePolicy) -> Self {
        self.config.on_handler_error = policy;
        self
    }

    /// 설정을 검증하고 `IngestConfig`를 생성합니다.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        IngestConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = scorewatch_core::config::ScorewatchConfig::default();
        core.general.state_dir = "/tmp/sw-state".to_owned();
        core.ingest.watch_paths = vec!["/var/log/game/arena1.log".to_owned()];
        core.ingest.poll_interval_ms = 200;
        core.ingest.queue_depth = 256;

        let config = IngestConfig::from_core(&core);
        assert_eq!(config.state_dir, "/tmp/sw-state");
        assert_eq!(config.poll_interval_ms, 200);
        assert_eq!(config.queue_depth, 256);
        // 확장 필드는 기본값
        assert_eq!(config.identity_check_interval_ms, 1000);
        assert_eq!(config.on_handler_error, HandlerFailurePolicy::Advance);
    }

    #[test]
    fn validate_rejects_relative_watch_path() {
        let mut config = IngestConfig::default();
        config.watch_paths = vec!["logs/server.log".to_owned()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_path_traversal() {
        let mut config = IngestConfig::default();
        config.watch_paths = vec!["/var/log/../etc/passwd".to_owned()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_queue_depth() {
        let mut config = IngestConfig::default();
        config.queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_tiny_scan_chunk() {
        let mut config = IngestConfig::default();
        config.scan_chunk_bytes = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_marker_pattern() {
        let mut config = IngestConfig::default();
        config.map_change_pattern = "(unclosed".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = IngestConfigBuilder::new()
            .watch_paths(vec!["/var/log/game/arena1.log".to_owned()])
            .state_dir("/tmp/sw")
            .poll_interval_ms(50)
            .queue_depth(64)
            .on_handler_error(HandlerFailurePolicy::Halt)
            .build()
            .unwrap();
        assert_eq!(config.queue_depth, 64);
        assert_eq!(config.on_handler_error, HandlerFailurePolicy::Halt);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = IngestConfigBuilder::new().poll_interval_ms(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn handler_policy_serde_round_trip() {
        let policy: HandlerFailurePolicy = serde_json::from_str("\"halt\"").unwrap();
        assert_eq!(policy, HandlerFailurePolicy::Halt);
        assert_eq!(
            serde_json::to_string(&HandlerFailurePolicy::Advance).unwrap(),
            "\"advance\""
        );
    }
}
