//! 인제스트 에러 타입
//!
//! [`IngestError`]는 인제스트 엔진 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<IngestError> for ScorewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use scorewatch_core::error::{PipelineError, ScorewatchError};

/// 인제스트 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 소스 경로/식별자 문제
    #[error("source error: {path}: {reason}")]
    Source {
        /// 문제가 된 소스 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 체크포인트 저장소 에러
    #[error("checkpoint error: {key}: {reason}")]
    Checkpoint {
        /// 체크포인트 키 (소스 파일 base name)
        key: String,
        /// 에러 사유
        reason: String,
    },

    /// 역방향 스캔 에러
    #[error("scan error: {path}: {reason}")]
    Scan {
        /// 스캔 대상 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러 (수신 측 소멸 등)
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 마커 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<IngestError> for ScorewatchError {
    fn from(err: IngestError) -> Self {
        ScorewatchError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
