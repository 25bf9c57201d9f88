//! 로테이션/트렁케이션 감지
//!
//! "이 경로의 파일이 이전과 같은 스트림인가"를 주기적으로 판정합니다.
//! 판정은 시작 시 한 번이 아니라 라이브 테일 중에도 계속 수행됩니다.
//! 로테이션은 붙어 있는 동안 언제든 일어날 수 있기 때문입니다.
//!
//! # 저하 모드
//! 플랫폼 파일 정체성도 첫 라인 스탬프도 없는 파일에서는 감지가
//! 크기 축소 기반으로만 동작합니다. 이 모드에서는 같은 크기로의
//! 교체를 감지할 수 없습니다. 이는 문서화된 한계이지 버그가 아닙니다.

use std::path::Path;

use scorewatch_core::pipeline::LineMarkers;
use tracing::debug;

use crate::error::IngestError;
use crate::identity::{StreamIdentity, native_file_id, read_first_line};

/// 정체성 검사 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCheck {
    /// 같은 스트림, 크기 정상
    Unchanged,
    /// 경로의 파일이 다른 파일로 교체됨
    Rotated,
    /// 같은 파일이 제자리에서 줄어듦
    Truncated,
}

/// 소스 하나의 정체성/크기를 추적하는 감지기
#[derive(Debug)]
pub struct RotationDetector {
    identity: StreamIdentity,
    last_size: u64,
}

impl RotationDetector {
    /// 현재 스트림의 지문과 크기로 감지기를 생성합니다.
    pub fn new(identity: StreamIdentity, size: u64) -> Self {
        Self {
            identity,
            last_size: size,
        }
    }

    /// 기록된 지문을 반환합니다.
    pub fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    /// 경로를 다시 조사하여 스트림 상태를 판정합니다.
    ///
    /// `read_pos`는 호출자가 이미 소비한 파일 위치입니다. 검사 주기
    /// 사이에 파일이 자란 뒤 줄어드는 경우를 놓치지 않기 위해
    /// `last_size`뿐 아니라 이 값 아래로의 축소도 트렁케이션으로
    /// 판정합니다.
    ///
    /// 파일이 사라진 경우는 `NotFound` I/O 에러로 전파되며, 호출자는
    /// 이를 로테이션 대기(재열기 재시도)로 다룹니다.
    pub async fn check<M: LineMarkers>(
        &mut self,
        path: &Path,
        markers: &M,
        read_pos: u64,
    ) -> Result<FileCheck, IngestError> {
        let meta = tokio::fs::metadata(path).await?;
        let size = meta.len();

        let fresh_native = native_file_id(&meta);
        if let (Some(recorded), Some(fresh)) = (&self.identity.native, &fresh_native) {
            if recorded != fresh {
                debug!(path = %path.display(), "native file identity changed");
                return Ok(FileCheck::Rotated);
            }
        }

        // 네이티브 신호가 일치해도 스탬프 불일치는 제자리 재작성을 뜻함
        if self.identity.opened_stamp.is_some() {
            let fresh_stamp = read_first_line(path)
                .await?
                .and_then(|line| markers.log_opened_at(&line));
            if let (Some(recorded), Some(fresh)) = (&self.identity.opened_stamp, &fresh_stamp) {
                if recorded != fresh {
                    debug!(path = %path.display(), "log opened stamp changed");
                    return Ok(FileCheck::Rotated);
                }
            }
        }

        if size < self.last_size || size < read_pos {
            return Ok(FileCheck::Truncated);
        }

        self.last_size = size;
        Ok(FileCheck::Unchanged)
    }

    /// 재열기 후 새 스트림의 지문과 크기로 다시 바인딩합니다.
    pub fn rebind(&mut self, identity: StreamIdentity, size: u64) {
        self.identity = identity;
        self.last_size = size;
    }
}
