//! 인제스트 파이프라인 — 소스별 태스크 조립과 생명주기
//!
//! [`IngestPipeline`]은 core의 [`Plugin`] trait을 구현하여
//! `scorewatch-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! per source:  Replay ─► LiveTailer ─► mpsc ─► Worker ─► LineParser ─► EventHandler
//!                                                │
//!                                           OffsetStore
//! ```
//!
//! 소스 하나당 읽기 태스크(리플레이 후 테일)와 워커 태스크가 하나씩
//! 떠서, 소스 내부는 엄격한 순차 처리, 소스 간에는 완전한 병렬성을
//! 가집니다. 전역 락은 없습니다.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use scorewatch_core::error::{PipelineError, ScorewatchError};
use scorewatch_core::metrics as m;
use scorewatch_core::pipeline::{EventHandler, HealthStatus, LineMarkers, LineParser};
use scorewatch_core::plugin::{Plugin, PluginInfo, PluginState, PluginType};

use crate::config::IngestConfig;
use crate::dispatch::{PendingItem, SourceDispatcher};
use crate::error::IngestError;
use crate::identity::StreamIdentity;
use crate::offset::OffsetStore;
use crate::replay::ReplayEngine;
use crate::rotation::RotationDetector;
use crate::scan::locate_resume_offset;
use crate::source::Source;
use crate::tailer::LiveTailer;

/// 실행 중인 소스 하나의 핸들 묶음
struct SourceTask {
    id: String,
    tail: JoinHandle<()>,
    dispatcher: SourceDispatcher,
}

/// 인제스트 파이프라인
///
/// 파서/핸들러/마커/체크포인트 저장소는 모두 주입됩니다.
/// 조립은 [`IngestPipelineBuilder`]로 합니다.
pub struct IngestPipeline<P, H, M, S> {
    info: PluginInfo,
    config: IngestConfig,
    parser: Arc<P>,
    handler: Arc<H>,
    markers: Arc<M>,
    store: Arc<S>,
    state: PluginState,
    cancel: CancellationToken,
    tasks: Vec<SourceTask>,
}

impl<P, H, M, S> IngestPipeline<P, H, M, S>
where
    P: LineParser + 'static,
    H: EventHandler + 'static,
    M: LineMarkers + 'static,
    S: OffsetStore,
{
    /// 현재 돌아가는 소스 수를 반환합니다.
    pub fn sources_running(&self) -> usize {
        self.tasks.iter().filter(|t| !t.tail.is_finished()).count()
    }

    /// 소스 하나의 읽기/워커 태스크 쌍을 띄웁니다.
    async fn spawn_source(&self, source: Source) -> Result<SourceTask, IngestError> {
        // 시작 시점에 해석 불가능한 경로는 여기서 걸러져 제외됨
        let meta = tokio::fs::metadata(source.path())
            .await
            .map_err(|e| IngestError::Source {
                path: source.path().display().to_string(),
                reason: e.to_string(),
            })?;
        let initial_size = meta.len();

        let dispatcher = SourceDispatcher::spawn(
            source.clone(),
            self.parser.clone(),
            self.handler.clone(),
            self.store.clone(),
            self.config.on_handler_error,
            self.config.queue_depth,
        );
        let tx = dispatcher.sender();

        let id = source.id().to_owned();
        let store = self.store.clone();
        let markers = self.markers.clone();
        let config = self.config.clone();
        let cancel = self.cancel.clone();

        let tail = tokio::spawn(async move {
            if let Err(e) = drive_source(
                source.clone(),
                initial_size,
                tx,
                store,
                markers,
                &config,
                cancel,
            )
            .await
            {
                error!(source = source.id(), error = %e, "source task stopped with error");
            }
        });

        Ok(SourceTask {
            id,
            tail,
            dispatcher,
        })
    }
}

/// 소스 하나의 수명: 시작 오프셋 결정 → 리플레이 → 라이브 테일
async fn drive_source<M, S>(
    source: Source,
    initial_size: u64,
    tx: mpsc::Sender<PendingItem>,
    store: Arc<S>,
    markers: Arc<M>,
    config: &IngestConfig,
    cancel: CancellationToken,
) -> Result<(), IngestError>
where
    M: LineMarkers + 'static,
    S: OffsetStore,
{
    let checkpoint = store.load(&source).await?;

    let start = if checkpoint == 0 {
        // 콜드 스타트: 전체 이력 리플레이 대신 최근 마커에서 재개
        let resume = locate_resume_offset(source.path(), markers.as_ref(), config.scan_chunk_bytes)
            .await?;
        if resume > 0 {
            info!(source = source.id(), offset = resume, "cold start resume point located");
        }
        resume
    } else if checkpoint > initial_size {
        // 꺼져 있는 동안 파일이 교체/축소됨: 새 스트림으로 간주
        warn!(
            source = source.id(),
            checkpoint,
            size = initial_size,
            "checkpoint beyond file size, restarting from 0"
        );
        tx.send(PendingItem::ResetCheckpoint)
            .await
            .map_err(|e| IngestError::Channel(e.to_string()))?;
        0
    } else {
        checkpoint
    };

    let identity = StreamIdentity::probe(source.path(), markers.as_ref()).await?;
    let (reader, caught_up_to) = ReplayEngine::replay(&source, start, &tx, &cancel).await?;
    info!(
        source = source.id(),
        from = start,
        to = caught_up_to,
        "replay complete, entering live tail"
    );

    let detector = RotationDetector::new(identity, initial_size.max(caught_up_to));
    let mut tailer = LiveTailer::new(
        source,
        reader,
        detector,
        markers,
        tx,
        config.poll_interval(),
        config.identity_check_interval(),
    );
    tailer.run(cancel).await
}

impl<P, H, M, S> Plugin for IngestPipeline<P, H, M, S>
where
    P: LineParser + 'static,
    H: EventHandler + 'static,
    M: LineMarkers + 'static,
    S: OffsetStore,
{
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn init(&mut self) -> Result<(), ScorewatchError> {
        if self.state != PluginState::Created {
            return Err(PipelineError::InitFailed(format!(
                "init called in state '{}'",
                self.state
            ))
            .into());
        }

        self.config.validate().map_err(ScorewatchError::from)?;
        tokio::fs::create_dir_all(&self.config.state_dir)
            .await
            .map_err(|e| {
                PipelineError::InitFailed(format!(
                    "state dir '{}' not usable: {e}",
                    self.config.state_dir
                ))
            })?;

        self.state = PluginState::Initialized;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), ScorewatchError> {
        if !matches!(
            self.state,
            PluginState::Initialized | PluginState::Stopped
        ) {
            return Err(PipelineError::InitFailed(format!(
                "start called in state '{}'",
                self.state
            ))
            .into());
        }

        self.cancel = CancellationToken::new();

        let paths = self.config.watch_paths.clone();
        let mut excluded = 0usize;
        for path in &paths {
            let source = match Source::new(path) {
                Ok(source) => source,
                Err(e) => {
                    error!(path, error = %e, "invalid source path, excluding");
                    excluded += 1;
                    continue;
                }
            };
            match self.spawn_source(source).await {
                Ok(task) => {
                    info!(source = task.id, "source started");
                    self.tasks.push(task);
                }
                Err(e) => {
                    // 단일 소스 실패가 전체 수집을 멈추지 않음
                    error!(path, error = %e, "source failed to start, excluding");
                    excluded += 1;
                }
            }
        }

        if self.tasks.is_empty() {
            self.state = PluginState::Failed;
            return Err(PipelineError::InitFailed(format!(
                "no sources started ({excluded} excluded)"
            ))
            .into());
        }

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::INGEST_ACTIVE_SOURCES).set(self.tasks.len() as f64);
        info!(
            started = self.tasks.len(),
            excluded,
            "ingest pipeline started"
        );
        self.state = PluginState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ScorewatchError> {
        if self.state != PluginState::Running {
            return Err(PipelineError::ShutdownFailed(format!(
                "stop called in state '{}'",
                self.state
            ))
            .into());
        }

        // 읽기 태스크를 먼저 멈추고 (송신 측 소멸), 워커가 큐를 드레인
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.tail.await {
                warn!(source = task.id, error = %e, "tail task join failed");
            }
            task.dispatcher.shutdown().await;
        }

        metrics::gauge!(m::INGEST_ACTIVE_SOURCES).set(0.0);
        self.state = PluginState::Stopped;
        info!("ingest pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if self.state != PluginState::Running {
            return HealthStatus::Degraded(format!("state: {}", self.state));
        }

        let total = self.tasks.len();
        let running = self.sources_running();
        if running == total {
            HealthStatus::Healthy
        } else if running > 0 {
            HealthStatus::Degraded(format!("{}/{} sources stopped", total - running, total))
        } else {
            HealthStatus::Unhealthy("all sources stopped".to_owned())
        }
    }
}

/// 인제스트 파이프라인 빌더
///
/// 파서, 핸들러, 마커, 저장소가 모두 지정되어야 빌드됩니다.
pub struct IngestPipelineBuilder<P, H, M, S> {
    config: Option<IngestConfig>,
    parser: Option<Arc<P>>,
    handler: Option<Arc<H>>,
    markers: Option<Arc<M>>,
    store: Option<Arc<S>>,
}

impl<P, H, M, S> IngestPipelineBuilder<P, H, M, S>
where
    P: LineParser + 'static,
    H: EventHandler + 'static,
    M: LineMarkers + 'static,
    S: OffsetStore,
{
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: None,
            parser: None,
            handler: None,
            markers: None,
            store: None,
        }
    }

    /// 설정을 지정합니다.
    pub fn config(mut self, config: IngestConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 라인 파서를 지정합니다.
    pub fn parser(mut self, parser: P) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// 이벤트 핸들러를 지정합니다.
    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// 구조 마커를 지정합니다.
    pub fn markers(mut self, markers: M) -> Self {
        self.markers = Some(Arc::new(markers));
        self
    }

    /// 체크포인트 저장소를 지정합니다.
    pub fn offset_store(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// 파이프라인을 조립합니다.
    pub fn build(self) -> Result<IngestPipeline<P, H, M, S>, IngestError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let missing = |what: &str| IngestError::Config {
            field: what.to_owned(),
            reason: "required component not provided".to_owned(),
        };

        Ok(IngestPipeline {
            info: PluginInfo {
                name: "ingest".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                description: "game server log ingest pipeline".to_owned(),
                plugin_type: PluginType::Ingest,
            },
            config,
            parser: self.parser.ok_or_else(|| missing("parser"))?,
            handler: self.handler.ok_or_else(|| missing("handler"))?,
            markers: self.markers.ok_or_else(|| missing("markers"))?,
            store: self.store.ok_or_else(|| missing("offset_store"))?,
            state: PluginState::Created,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

impl<P, H, M, S> Default for IngestPipelineBuilder<P, H, M, S>
where
    P: LineParser + 'static,
    H: EventHandler + 'static,
    M: LineMarkers + 'static,
    S: OffsetStore,
{
    fn default() -> Self {
        Self::new()
    }
}
