//! 라이브 테일 — EOF 너머를 따라가는 상태 기계
//!
//! 상태는 셋입니다:
//! - **Following**: 현재 위치에서 새 데이터를 폴링
//! - **Reopening**: 로테이션/트렁케이션 감지 후 재열기 + 0부터 리플레이
//! - **Closed**: 셧다운
//!
//! 데이터가 없을 때는 바쁜 대기 대신 짧은 고정 주기로 쉬고, 정체성/크기
//! 재검사는 더 긴 독립 주기로 돌려 per-read 오버헤드 없이 로테이션 감지
//! 지연을 묶어둡니다. 파일이 통째로 사라진 경우는 로테이션 대기로 간주해
//! 경로가 다시 나타날 때까지 재시도합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scorewatch_core::metrics as m;
use scorewatch_core::pipeline::LineMarkers;

use crate::dispatch::PendingItem;
use crate::error::IngestError;
use crate::identity::StreamIdentity;
use crate::replay::{DrainOutcome, LineReader, ReplayEngine};
use crate::rotation::{FileCheck, RotationDetector};
use crate::source::Source;

/// 테일러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerState {
    /// 현재 위치에서 새 데이터를 따라가는 중
    Following,
    /// 로테이션/트렁케이션 전환 처리 중
    Reopening,
    /// 셧다운 완료
    Closed,
}

/// 소스 하나를 따라가는 라이브 테일러
pub struct LiveTailer<M: LineMarkers> {
    source: Source,
    reader: LineReader,
    detector: RotationDetector,
    markers: Arc<M>,
    tx: mpsc::Sender<PendingItem>,
    poll_interval: Duration,
    identity_check_interval: Duration,
    state: TailerState,
}

impl<M: LineMarkers> LiveTailer<M> {
    /// 리플레이가 끝난 위치의 리더를 넘겨받아 테일러를 생성합니다.
    pub fn new(
        source: Source,
        reader: LineReader,
        detector: RotationDetector,
        markers: Arc<M>,
        tx: mpsc::Sender<PendingItem>,
        poll_interval: Duration,
        identity_check_interval: Duration,
    ) -> Self {
        Self {
            source,
            reader,
            detector,
            markers,
            tx,
            poll_interval,
            identity_check_interval,
            state: TailerState::Following,
        }
    }

    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> TailerState {
        self.state
    }

    /// 셧다운 신호가 올 때까지 소스를 따라갑니다.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), IngestError> {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut identity_tick = tokio::time::interval(self.identity_check_interval);
        identity_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.state = TailerState::Following;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.state = TailerState::Closed;
                    info!(source = self.source.id(), "tailer shutting down");
                    return Ok(());
                }
                _ = identity_tick.tick() => {
                    if !self.check_identity(&cancel).await? {
                        self.state = TailerState::Closed;
                        return Ok(());
                    }
                }
                _ = poll.tick() => {
                    match self.reader.drain_to_eof(&self.tx, &cancel).await {
                        Ok(DrainOutcome::Eof { .. }) => {}
                        Ok(DrainOutcome::Cancelled) => {
                            self.state = TailerState::Closed;
                            return Ok(());
                        }
                        Err(IngestError::Channel(e)) => {
                            return Err(IngestError::Channel(e));
                        }
                        Err(e) => {
                            // 일시적 I/O 실패: 다음 폴링 틱에 재시도
                            warn!(
                                source = self.source.id(),
                                error = %e,
                                "read failed, retrying on next poll"
                            );
                        }
                    }
                }
            }
        }
    }

    /// 정체성/크기를 재검사하고 필요하면 재열기를 수행합니다.
    ///
    /// 반환값 `false`는 셧다운으로 인한 중단을 의미합니다.
    async fn check_identity(&mut self, cancel: &CancellationToken) -> Result<bool, IngestError> {
        let read_pos = self.reader.committed_pos();
        match self
            .detector
            .check(self.source.path(), self.markers.as_ref(), read_pos)
            .await
        {
            Ok(FileCheck::Unchanged) => Ok(true),
            Ok(FileCheck::Rotated) => {
                metrics::counter!(m::INGEST_ROTATIONS_TOTAL, m::LABEL_SOURCE => self.source.id().to_owned())
                    .increment(1);
                info!(source = self.source.id(), "rotation detected, reopening");
                self.reopen(cancel).await
            }
            Ok(FileCheck::Truncated) => {
                metrics::counter!(m::INGEST_TRUNCATIONS_TOTAL, m::LABEL_SOURCE => self.source.id().to_owned())
                    .increment(1);
                info!(source = self.source.id(), "truncation detected, reopening");
                self.reopen(cancel).await
            }
            Err(IngestError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    source = self.source.id(),
                    "log file missing, waiting for it to reappear"
                );
                self.reopen(cancel).await
            }
            Err(e) => {
                warn!(
                    source = self.source.id(),
                    error = %e,
                    "identity check failed, retrying on next tick"
                );
                Ok(true)
            }
        }
    }

    /// 재열기: 체크포인트 0 리셋 → 경로 재등장 대기 → 0부터 리플레이
    ///
    /// 리셋은 큐를 통해 전달되어 회전 전 라인들의 커밋 뒤에 적용됩니다.
    async fn reopen(&mut self, cancel: &CancellationToken) -> Result<bool, IngestError> {
        self.state = TailerState::Reopening;

        self.tx
            .send(PendingItem::ResetCheckpoint)
            .await
            .map_err(|e| IngestError::Channel(e.to_string()))?;

        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }

            match self.try_reopen(cancel).await {
                Ok(Some(pos)) => {
                    info!(
                        source = self.source.id(),
                        caught_up_to = pos,
                        signals = identity_signal_label(self.detector.identity()),
                        "reopened and replayed from start"
                    );
                    self.state = TailerState::Following;
                    return Ok(true);
                }
                // 경로가 아직(또는 다시) 없음: 재등장을 기다림
                Ok(None) => {}
                Err(IngestError::Channel(e)) => return Err(IngestError::Channel(e)),
                Err(e) => {
                    warn!(
                        source = self.source.id(),
                        error = %e,
                        "reopen failed, retrying"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.cancelled() => return Ok(false),
            }
        }
    }

    /// 재열기 1회 시도. 경로가 없으면 `Ok(None)`.
    ///
    /// 프로브와 리플레이 사이에 파일이 다시 사라지는 경쟁도
    /// `Ok(None)`으로 수렴시켜 호출 측 대기 루프가 흡수합니다.
    async fn try_reopen(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, IngestError> {
        let not_found =
            |e: &IngestError| matches!(e, IngestError::Io(io) if io.kind() == std::io::ErrorKind::NotFound);

        let identity = match StreamIdentity::probe(self.source.path(), self.markers.as_ref()).await
        {
            Ok(identity) => identity,
            Err(e) if not_found(&e) => return Ok(None),
            Err(e) => return Err(e),
        };

        let size = match tokio::fs::metadata(self.source.path()).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match ReplayEngine::replay(&self.source, 0, &self.tx, cancel).await {
            Ok((reader, pos)) => {
                self.reader = reader;
                self.detector.rebind(identity, size);
                Ok(Some(pos))
            }
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn identity_signal_label(identity: &StreamIdentity) -> &'static str {
    match identity.signal_count() {
        2 => "native+stamp",
        1 => "single",
        _ => "size-only",
    }
}
