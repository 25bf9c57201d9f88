//! 체크포인트 저장소 — 소스별 바이트 오프셋의 영속화
//!
//! 소스마다 "마지막으로 처리 완료된 위치"를 작은 파일 하나로 보관하여
//! 프로세스 재시작 후에도 이어서 처리할 수 있게 합니다.
//!
//! # 내구성과 재처리 윈도우
//! 저장 실패는 로깅 후 계속 진행합니다 (수집 중단보다 at-least-once
//! 재전달이 낫다는 정책). 이 경우 다음 크래시에서 마지막 저장 지점
//! 이후의 라인이 재처리될 수 있으므로 핸들러는 멱등해야 합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::IngestError;
use crate::source::Source;

/// 소스별 체크포인트 저장소 trait
///
/// 구현체는 [`FileOffsetStore`](파일 기반, 프로덕션)와
/// [`MemoryOffsetStore`](휘발성, 테스트/진단용)가 있습니다.
pub trait OffsetStore: Send + Sync + 'static {
    /// 저장된 오프셋을 읽습니다. 기록이 없거나 손상되었으면 0을 반환합니다.
    fn load(&self, source: &Source) -> impl Future<Output = Result<u64, IngestError>> + Send;

    /// 오프셋을 내구성 있게 저장합니다. 반환 시점에 디스크에 도달해 있어야 합니다.
    fn save(
        &self,
        source: &Source,
        offset: u64,
    ) -> impl Future<Output = Result<(), IngestError>> + Send;
}

/// 파일 기반 체크포인트 저장소
///
/// 상태 디렉토리에 소스당 `<base name>.offset` 파일 하나를 둡니다.
/// 키가 전체 경로가 아닌 base name이므로 로그 디렉토리를 옮겨도
/// 이력이 유지됩니다. 쓰기는 임시 파일 + fsync + rename으로
/// 부분 기록을 방지합니다.
#[derive(Debug, Clone)]
pub struct FileOffsetStore {
    state_dir: PathBuf,
}

impl FileOffsetStore {
    /// 상태 디렉토리를 지정하여 저장소를 생성합니다.
    ///
    /// 디렉토리는 호출 시점에 존재하지 않아도 되며, 첫 저장 전에
    /// [`ensure_dir`](Self::ensure_dir)로 생성합니다.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// 상태 디렉토리를 생성합니다 (이미 있으면 no-op).
    pub async fn ensure_dir(&self) -> Result<(), IngestError> {
        tokio::fs::create_dir_all(&self.state_dir).await?;
        Ok(())
    }

    /// 소스의 체크포인트 파일 경로를 반환합니다.
    pub fn checkpoint_path(&self, source: &Source) -> PathBuf {
        self.state_dir
            .join(format!("{}.offset", source.checkpoint_key()))
    }

    fn parse_offset(content: &str, path: &Path) -> u64 {
        match content.trim().parse::<u64>() {
            Ok(offset) => offset,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "corrupt checkpoint file, starting from 0"
                );
                0
            }
        }
    }
}

impl OffsetStore for FileOffsetStore {
    async fn load(&self, source: &Source) -> Result<u64, IngestError> {
        let path = self.checkpoint_path(source);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Self::parse_offset(&content, &path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(IngestError::Checkpoint {
                key: source.checkpoint_key().to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    async fn save(&self, source: &Source, offset: u64) -> Result<(), IngestError> {
        let path = self.checkpoint_path(source);
        let tmp = path.with_extension("offset.tmp");

        let result: Result<(), std::io::Error> = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(offset.to_string().as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        result.map_err(|e| IngestError::Checkpoint {
            key: source.checkpoint_key().to_owned(),
            reason: e.to_string(),
        })
    }
}

/// 인메모리 체크포인트 저장소
///
/// 재시작 간 영속성이 필요 없는 진단 CLI와 테스트에서 사용합니다.
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    offsets: Mutex<HashMap<String, u64>>,
}

impl MemoryOffsetStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OffsetStore for MemoryOffsetStore {
    async fn load(&self, source: &Source) -> Result<u64, IngestError> {
        let offsets = self.offsets.lock().expect("offset map poisoned");
        Ok(offsets.get(source.checkpoint_key()).copied().unwrap_or(0))
    }

    async fn save(&self, source: &Source, offset: u64) -> Result<(), IngestError> {
        let mut offsets = self.offsets.lock().expect("offset map poisoned");
        offsets.insert(source.checkpoint_key().to_owned(), offset);
        Ok(())
    }
}
