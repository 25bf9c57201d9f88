//! 소스 — 논리적 로그 스트림 하나의 식별
//!
//! [`Source`]는 파일 경로와 거기서 파생된 식별자의 쌍입니다.
//! 같은 경로를 동시에 처리하는 Source 인스턴스는 파이프라인당
//! 정확히 하나입니다.

use std::path::{Path, PathBuf};

use crate::error::IngestError;

/// 논리적 로그 스트림 하나
///
/// 식별자는 파일 이름에서 결정적으로 파생되므로 로그 디렉토리를
/// 옮겨도 같은 소스로 인식됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    path: PathBuf,
    id: String,
}

impl Source {
    /// 파일 경로에서 소스를 생성합니다.
    ///
    /// 식별자는 확장자를 제외한 파일 이름입니다
    /// (예: `/var/log/game/arena1.log` → `arena1`).
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let path = path.into();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(ToOwned::to_owned)
            .ok_or_else(|| IngestError::Source {
                path: path.display().to_string(),
                reason: "path has no usable file name".to_owned(),
            })?;
        Ok(Self { path, id })
    }

    /// 소스 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 소스 식별자를 반환합니다.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 체크포인트 저장소 키를 반환합니다.
    ///
    /// 전체 경로가 아닌 base name이므로 로그 디렉토리 이동이
    /// 체크포인트 이력을 무효화하지 않습니다.
    pub fn checkpoint_key(&self) -> &str {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.id)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.path.display())
    }
}
