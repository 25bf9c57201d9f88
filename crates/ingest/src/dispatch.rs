//! 소스별 디스패치 — FIFO 큐 하나와 워커 하나
//!
//! 소스마다 바운디드 큐와 전담 워커 태스크를 둡니다. 워커는
//! 파싱 → 핸들링 → 체크포인트 커밋을 엄격히 순차로 수행하므로
//! 한 서버 로그 안의 이벤트 순서는 파일에 쓰인 순서 그대로
//! 보존됩니다. 서로 다른 소스의 워커는 완전히 독립적으로 돌아
//! 한 소스의 느린 핸들러가 다른 소스를 막지 못합니다.
//!
//! # 셧다운 드레인
//! 송신 측이 닫히면 워커는 큐에 남은 항목을 모두 처리한 뒤
//! 종료합니다. 디스크에서 읽어 큐에 넣은 라인은 버려지지 않습니다.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use scorewatch_core::metrics as m;
use scorewatch_core::pipeline::{EventHandler, LineParser};

use crate::config::HandlerFailurePolicy;
use crate::offset::OffsetStore;
use crate::source::Source;

/// 테일러/리플레이와 워커 사이를 오가는 큐 항목
#[derive(Debug, Clone)]
pub enum PendingItem {
    /// 종결된 로그 라인 하나
    Line(PendingLine),
    /// 체크포인트 0 리셋 (로테이션/트렁케이션 직후)
    ///
    /// 리셋을 큐로 흘려보내면 큐에 이미 들어간 회전 전 라인들이
    /// 모두 커밋된 뒤에 리셋이 적용되므로, 체크포인트 기록의
    /// 단일 변경자(워커) 원칙과 순서가 함께 지켜집니다.
    ResetCheckpoint,
}

/// 라인 하나와 그 커밋 지점
#[derive(Debug, Clone)]
pub struct PendingLine {
    /// 종결자를 제거한 원시 라인 바이트
    pub raw: Bytes,
    /// 이 라인의 종결자 다음 바이트 오프셋 (체크포인트 값)
    pub end_offset: u64,
}

/// 소스 하나의 큐 + 워커 핸들
pub struct SourceDispatcher {
    tx: mpsc::Sender<PendingItem>,
    handle: JoinHandle<()>,
}

impl SourceDispatcher {
    /// 워커 태스크를 띄우고 디스패처를 생성합니다.
    pub fn spawn<P, H, S>(
        source: Source,
        parser: Arc<P>,
        handler: Arc<H>,
        store: Arc<S>,
        policy: HandlerFailurePolicy,
        queue_depth: usize,
    ) -> Self
    where
        P: LineParser + 'static,
        H: EventHandler + 'static,
        S: OffsetStore,
    {
        let (tx, rx) = mpsc::channel(queue_depth);
        let handle = tokio::spawn(run_worker(source, rx, parser, handler, store, policy));
        Self { tx, handle }
    }

    /// 큐 송신 측을 복제해 반환합니다.
    pub fn sender(&self) -> mpsc::Sender<PendingItem> {
        self.tx.clone()
    }

    /// 송신 측을 닫고 워커가 큐를 드레인하고 끝날 때까지 기다립니다.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "dispatch worker join failed");
        }
    }
}

/// 워커 본체: 파싱 → 핸들링 → 체크포인트 커밋의 순차 루프
async fn run_worker<P, H, S>(
    source: Source,
    mut rx: mpsc::Receiver<PendingItem>,
    parser: Arc<P>,
    handler: Arc<H>,
    store: Arc<S>,
    policy: HandlerFailurePolicy,
) where
    P: LineParser,
    H: EventHandler,
    S: OffsetStore,
{
    let source_label = source.id().to_owned();

    while let Some(item) = rx.recv().await {
        match item {
            PendingItem::ResetCheckpoint => {
                if let Err(e) = store.save(&source, 0).await {
                    metrics::counter!(m::INGEST_CHECKPOINT_FAILURES_TOTAL, m::LABEL_SOURCE => source_label.clone())
                        .increment(1);
                    warn!(source = source.id(), error = %e, "checkpoint reset failed");
                }
                continue;
            }
            PendingItem::Line(line) => {
                let text = String::from_utf8_lossy(&line.raw);

                match parser.parse_line(&text, source.id()) {
                    Ok(Some(event)) => {
                        if let Err(e) = handler.handle(event, source.path()).await {
                            metrics::counter!(m::INGEST_HANDLER_ERRORS_TOTAL, m::LABEL_SOURCE => source_label.clone())
                                .increment(1);
                            match policy {
                                HandlerFailurePolicy::Advance => {
                                    warn!(
                                        source = source.id(),
                                        offset = line.end_offset,
                                        raw_line = %text,
                                        error = %e,
                                        "handler failed, advancing checkpoint per policy"
                                    );
                                }
                                HandlerFailurePolicy::Halt => {
                                    error!(
                                        source = source.id(),
                                        offset = line.end_offset,
                                        raw_line = %text,
                                        error = %e,
                                        "handler failed, halting source per policy"
                                    );
                                    return;
                                }
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        metrics::counter!(m::INGEST_PARSE_ERRORS_TOTAL, m::LABEL_SOURCE => source_label.clone())
                            .increment(1);
                        warn!(
                            source = source.id(),
                            offset = line.end_offset,
                            raw_line = %text,
                            error = %e,
                            "parse error, skipping line"
                        );
                    }
                }

                if let Err(e) = store.save(&source, line.end_offset).await {
                    metrics::counter!(m::INGEST_CHECKPOINT_FAILURES_TOTAL, m::LABEL_SOURCE => source_label.clone())
                        .increment(1);
                    warn!(
                        source = source.id(),
                        offset = line.end_offset,
                        error = %e,
                        "checkpoint save failed, continuing"
                    );
                }

                metrics::counter!(m::INGEST_LINES_TOTAL, m::LABEL_SOURCE => source_label.clone())
                    .increment(1);
            }
        }
    }

    debug!(source = source.id(), "dispatch worker drained and exiting");
}
