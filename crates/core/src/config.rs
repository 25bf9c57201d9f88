//! 설정 관리 — scorewatch.toml 파싱 및 런타임 설정
//!
//! [`ScorewatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SCOREWATCH_INGEST_QUEUE_DEPTH=2048` 형식)
//! 3. 설정 파일 (`scorewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), scorewatch_core::error::ScorewatchError> {
//! use scorewatch_core::config::ScorewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ScorewatchConfig::load("scorewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ScorewatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ScorewatchError};

/// Scorewatch 통합 설정
///
/// `scorewatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorewatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 인제스트 설정
    #[serde(default)]
    pub ingest: IngestSection,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ScorewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScorewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ScorewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScorewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ScorewatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ScorewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            ScorewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SCOREWATCH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SCOREWATCH_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "SCOREWATCH_GENERAL_LOG_FORMAT",
        );
        override_string(&mut self.general.state_dir, "SCOREWATCH_GENERAL_STATE_DIR");
        override_string(&mut self.general.pid_file, "SCOREWATCH_GENERAL_PID_FILE");

        // Ingest
        override_bool(&mut self.ingest.enabled, "SCOREWATCH_INGEST_ENABLED");
        override_csv(&mut self.ingest.watch_paths, "SCOREWATCH_INGEST_WATCH_PATHS");
        override_u64(
            &mut self.ingest.poll_interval_ms,
            "SCOREWATCH_INGEST_POLL_INTERVAL_MS",
        );
        override_usize(&mut self.ingest.queue_depth, "SCOREWATCH_INGEST_QUEUE_DEPTH");

        // Metrics
        override_bool(&mut self.metrics.enabled, "SCOREWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "SCOREWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "SCOREWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ScorewatchError> {
        const VALID_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        const VALID_FORMATS: &[&str] = &["json", "pretty"];

        // log_level은 env-filter 지시어일 수도 있으므로 단순 레벨일 때만 검사
        if !self.general.log_level.contains(['=', ','])
            && !VALID_LEVELS.contains(&self.general.log_level.as_str())
        {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("'{}' is not a log level", self.general.log_level),
            }
            .into());
        }

        if !VALID_FORMATS.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!(
                    "'{}' is not supported (expected 'json' or 'pretty')",
                    self.general.log_format
                ),
            }
            .into());
        }

        if self.general.state_dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "general.state_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.ingest.enabled && self.ingest.watch_paths.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ingest.watch_paths".to_owned(),
                reason: "at least one watch path is required when ingest is enabled".to_owned(),
            }
            .into());
        }

        if self.ingest.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.ingest.queue_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.queue_depth".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정 (`[general]` 섹션)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error) 또는 env-filter 지시어
    pub log_level: String,
    /// 로그 출력 형식 ("json" 또는 "pretty")
    pub log_format: String,
    /// 체크포인트 파일이 저장되는 상태 디렉토리
    pub state_dir: String,
    /// PID 파일 경로 (빈 문자열이면 비활성)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            state_dir: "/var/lib/scorewatch".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 인제스트 설정 (`[ingest]` 섹션)
///
/// 인제스트 전용 확장 필드(마커 패턴, 스캔 청크 크기 등)는
/// `scorewatch-ingest`의 `IngestConfig`가 이 구조체로부터 파생하며
/// 기본값으로 보충합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    /// 활성화 여부
    pub enabled: bool,
    /// 감시할 로그 파일 경로 목록
    pub watch_paths: Vec<String>,
    /// 새 데이터 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 소스당 디스패치 큐 깊이
    pub queue_depth: usize,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            enabled: true,
            watch_paths: vec!["/var/log/game/server.log".to_owned()],
            poll_interval_ms: 150,
            queue_depth: 1024,
        }
    }
}

/// 메트릭 설정 (`[metrics]` 섹션)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// HTTP 리스너 바인드 주소
    pub listen_addr: String,
    /// HTTP 리스너 포트
    pub port: u16,
    /// 스크레이프 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9184,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(field: &mut String, env_key: &str) {
    if let Ok(value) = std::env::var(env_key) {
        *field = value;
    }
}

fn override_bool(field: &mut bool, env_key: &str) {
    if let Ok(value) = std::env::var(env_key) {
        match value.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => warn!(env_key, value, "invalid bool in env override, ignoring"),
        }
    }
}

fn override_u16(field: &mut u16, env_key: &str) {
    if let Ok(value) = std::env::var(env_key) {
        match value.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => warn!(env_key, value, "invalid u16 in env override, ignoring"),
        }
    }
}

fn override_u64(field: &mut u64, env_key: &str) {
    if let Ok(value) = std::env::var(env_key) {
        match value.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => warn!(env_key, value, "invalid u64 in env override, ignoring"),
        }
    }
}

fn override_usize(field: &mut usize, env_key: &str) {
    if let Ok(value) = std::env::var(env_key) {
        match value.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => warn!(env_key, value, "invalid usize in env override, ignoring"),
        }
    }
}

fn override_csv(field: &mut Vec<String>, env_key: &str) {
    if let Ok(value) = std::env::var(env_key) {
        *field = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
    }
}
