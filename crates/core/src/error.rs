//! 에러 타입 — 도메인별 에러 정의

/// Scorewatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ScorewatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 라인 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 이벤트 핸들러 에러
    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),

    /// 플러그인 생명주기 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 파이프라인 종료 실패
    #[error("pipeline shutdown failed: {0}")]
    ShutdownFailed(String),
}

/// 라인 파싱 에러
///
/// 파서 구현체가 개별 라인 파싱 실패를 보고할 때 사용합니다.
/// 파싱 실패는 해당 라인만 스킵되며 스트림을 중단하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 파싱 실패
    #[error("parse failed for source '{source_id}': {reason}")]
    Failed { source_id: String, reason: String },

    /// 유효하지 않은 UTF-8 등 입력 자체의 문제
    #[error("malformed input for source '{source_id}': {reason}")]
    MalformedInput { source_id: String, reason: String },
}

/// 이벤트 핸들러 에러
///
/// 핸들러 실패 시 체크포인트 전진 여부는 ingest 설정의
/// `on_handler_error` 정책이 결정합니다.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// 핸들러 처리 실패
    #[error("handler failed for '{source_path}': {reason}")]
    Failed { source_path: String, reason: String },
}

/// 플러그인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 동일 이름의 플러그인이 이미 등록됨
    #[error("plugin already registered: {name}")]
    AlreadyRegistered { name: String },

    /// 플러그인을 찾을 수 없음
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    /// 허용되지 않는 상태 전환
    #[error("plugin '{name}' in state '{current}', expected '{expected}'")]
    InvalidState {
        name: String,
        current: String,
        expected: String,
    },

    /// 하나 이상의 플러그인 정지 실패
    #[error("plugin stop failed: {0}")]
    StopFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound {
            path: "/etc/scorewatch/scorewatch.toml".to_owned(),
        };
        assert!(err.to_string().contains("scorewatch.toml"));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::Failed {
            source_id: "arena1".to_owned(),
            reason: "unexpected token".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("arena1"));
        assert!(msg.contains("unexpected token"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ScorewatchError = io.into();
        assert!(matches!(err, ScorewatchError::Io(_)));
    }

    #[test]
    fn handler_error_wraps_into_top_level() {
        let err: ScorewatchError = HandlerError::Failed {
            source_path: "/var/log/game/arena1.log".to_owned(),
            reason: "downstream unavailable".to_owned(),
        }
        .into();
        assert!(err.to_string().contains("arena1.log"));
    }

    #[test]
    fn plugin_error_invalid_state_display() {
        let err = PluginError::InvalidState {
            name: "ingest".to_owned(),
            current: "created".to_owned(),
            expected: "initialized".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ingest"));
        assert!(msg.contains("created"));
        assert!(msg.contains("initialized"));
    }
}
