//! 정규식 기반 구조 마커 인식
//!
//! [`RegexMarkers`]는 [`LineMarkers`] trait의 기본 구현으로,
//! 설정에서 받은 정규식 패턴 세 개로 맵 전환 / 서버 기동 /
//! "로그 시작" 스탬프 라인을 판별합니다.
//!
//! 기본 패턴은 흔한 게임 서버 로그 문구를 따르지만, 다른 형식은
//! 설정에서 패턴을 교체하면 됩니다.

use chrono::NaiveDateTime;
use regex::Regex;
use scorewatch_core::pipeline::LineMarkers;

use crate::config::IngestConfig;
use crate::error::IngestError;

/// 기본 맵 전환 패턴
pub const DEFAULT_MAP_CHANGE_PATTERN: &str = r"(?i)\b(?:changing map to|started map)\b";

/// 기본 서버 기동(최초 맵 로드) 패턴
pub const DEFAULT_SERVER_START_PATTERN: &str = r"(?i)\b(?:server initialization|initial map load)\b";

/// 기본 "로그 시작" 스탬프 패턴 (스탬프는 `ts` 그룹)
pub const DEFAULT_LOG_OPENED_PATTERN: &str = r"(?i)^log (?:file )?opened(?: at)?[:\s]+(?P<ts>.+)$";

/// 스탬프 해석에 시도하는 시각 형식들
const STAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y - %H:%M:%S",
];

/// 정규식 기반 [`LineMarkers`] 구현
#[derive(Debug, Clone)]
pub struct RegexMarkers {
    map_change: Regex,
    server_start: Regex,
    log_opened: Regex,
}

impl RegexMarkers {
    /// 패턴 문자열 세 개로 마커를 생성합니다.
    ///
    /// `log_opened` 패턴은 스탬프 텍스트를 `ts` 이름 그룹 또는
    /// 첫 번째 캡처 그룹으로 노출해야 합니다.
    pub fn new(
        map_change: &str,
        server_start: &str,
        log_opened: &str,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            map_change: Regex::new(map_change)?,
            server_start: Regex::new(server_start)?,
            log_opened: Regex::new(log_opened)?,
        })
    }

    /// 기본 패턴으로 마커를 생성합니다.
    pub fn with_defaults() -> Result<Self, IngestError> {
        Self::new(
            DEFAULT_MAP_CHANGE_PATTERN,
            DEFAULT_SERVER_START_PATTERN,
            DEFAULT_LOG_OPENED_PATTERN,
        )
    }

    /// 인제스트 설정의 패턴 필드로 마커를 생성합니다.
    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        Self::new(
            &config.map_change_pattern,
            &config.server_start_pattern,
            &config.log_opened_pattern,
        )
    }

    /// 스탬프 텍스트를 정규화합니다.
    ///
    /// 알려진 형식으로 해석되면 ISO 8601 문자열로, 아니면 트리밍한
    /// 원문 그대로 반환합니다. 정체성 비교는 동등성만 사용하므로
    /// 해석 실패가 오류는 아닙니다.
    fn normalize_stamp(raw: &str) -> String {
        let trimmed = raw.trim();
        for format in STAMP_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return dt.format("%Y-%m-%dT%H:%M:%S").to_string();
            }
        }
        trimmed.to_owned()
    }
}

impl LineMarkers for RegexMarkers {
    fn log_opened_at(&self, line: &str) -> Option<String> {
        let caps = self.log_opened.captures(line)?;
        let stamp = caps
            .name("ts")
            .or_else(|| caps.get(1))
            .map(|m| m.as_str())?;
        Some(Self::normalize_stamp(stamp))
    }

    fn is_map_change(&self, line: &str) -> bool {
        self.map_change.is_match(line)
    }

    fn is_server_start(&self, line: &str) -> bool {
        self.server_start.is_match(line)
    }
}
