//! 이벤트 시스템 — 파서 출력과 핸들러 입력의 기본 단위
//!
//! [`GameEvent`]는 파서가 로그 라인 하나에서 생성하는 도메인 이벤트입니다.
//! ingest 코어는 이벤트의 비즈니스 필드를 해석하지 않고 핸들러로 전달만 합니다.
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 추적 정보입니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// --- 모듈명 상수 ---

/// 인제스트 모듈명
pub const MODULE_INGEST: &str = "ingest";
/// 데몬 모듈명
pub const MODULE_DAEMON: &str = "daemon";
/// 진단 CLI 모듈명
pub const MODULE_CLI: &str = "cli";

/// 이벤트 메타데이터 — 발생 시각, 생성 모듈, 분산 추적 ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명 (예: "ingest")
    pub source_module: String,
    /// 분산 추적 ID — 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 유지하며 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id로 메타데이터를 생성합니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source={} trace={}",
            self.source_module, self.trace_id
        )
    }
}

/// 모든 이벤트가 구현하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio::mpsc` 채널을 통한
/// 안전한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 종류 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

/// 게임 서버 로그 라인 하나에서 파싱된 도메인 이벤트
///
/// ingest 코어 입장에서는 불투명한 값입니다. `kind`와 `fields`의
/// 해석은 파서/핸들러 구현체의 책임입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 이벤트 종류 (예: "kill", "map_change", "raw_line")
    pub kind: String,
    /// 이벤트를 생성한 소스 식별자
    pub source_id: String,
    /// 파서가 추출한 필드 (스키마는 파서 구현체가 정의)
    pub fields: serde_json::Value,
}

impl GameEvent {
    /// 새 GameEvent를 생성합니다.
    pub fn new(
        kind: impl Into<String>,
        source_id: impl Into<String>,
        fields: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_INGEST),
            kind: kind.into(),
            source_id: source_id.into(),
            fields,
        }
    }
}

impl Event for GameEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        &self.kind
    }
}
