//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `scorewatch_`
//! - 모듈명: `ingest_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 소스 식별자 레이블 키
pub const LABEL_SOURCE: &str = "source";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Ingest 메트릭 ─────────────────────────────────────────────────

/// Ingest: 디스패치된 전체 라인 수 (counter, label: source)
pub const INGEST_LINES_TOTAL: &str = "scorewatch_ingest_lines_total";

/// Ingest: 리플레이로 따라잡은 라인 수 (counter, label: source)
pub const INGEST_REPLAY_LINES_TOTAL: &str = "scorewatch_ingest_replay_lines_total";

/// Ingest: 파싱 에러 수 (counter, label: source)
pub const INGEST_PARSE_ERRORS_TOTAL: &str = "scorewatch_ingest_parse_errors_total";

/// Ingest: 핸들러 에러 수 (counter, label: source)
pub const INGEST_HANDLER_ERRORS_TOTAL: &str = "scorewatch_ingest_handler_errors_total";

/// Ingest: 감지된 로테이션 수 (counter, label: source)
pub const INGEST_ROTATIONS_TOTAL: &str = "scorewatch_ingest_rotations_total";

/// Ingest: 감지된 트렁케이션 수 (counter, label: source)
pub const INGEST_TRUNCATIONS_TOTAL: &str = "scorewatch_ingest_truncations_total";

/// Ingest: 체크포인트 저장 실패 수 (counter, label: source)
pub const INGEST_CHECKPOINT_FAILURES_TOTAL: &str = "scorewatch_ingest_checkpoint_failures_total";

/// Ingest: 활성 소스 수 (gauge)
pub const INGEST_ACTIVE_SOURCES: &str = "scorewatch_ingest_active_sources";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, label: version, 항상 1)
pub const DAEMON_BUILD_INFO: &str = "scorewatch_daemon_build_info";

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "scorewatch_daemon_uptime_seconds";

/// 모든 메트릭의 설명을 전역 recorder에 등록합니다.
///
/// recorder 설치 직후 1회 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(INGEST_LINES_TOTAL, "Lines dispatched to the handler");
    describe_counter!(
        INGEST_REPLAY_LINES_TOTAL,
        "Lines caught up during startup or post-rotation replay"
    );
    describe_counter!(INGEST_PARSE_ERRORS_TOTAL, "Lines skipped due to parse errors");
    describe_counter!(
        INGEST_HANDLER_ERRORS_TOTAL,
        "Handler invocations that returned an error"
    );
    describe_counter!(INGEST_ROTATIONS_TOTAL, "Detected log file rotations");
    describe_counter!(INGEST_TRUNCATIONS_TOTAL, "Detected in-place truncations");
    describe_counter!(
        INGEST_CHECKPOINT_FAILURES_TOTAL,
        "Checkpoint saves that failed (processing continued)"
    );
    describe_gauge!(INGEST_ACTIVE_SOURCES, "Sources currently being tailed");
    describe_gauge!(DAEMON_BUILD_INFO, "Daemon build information");
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
}
