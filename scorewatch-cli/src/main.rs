//! scorewatch-tail — 게임 서버 로그용 진단 테일 도구
//!
//! 데몬과 같은 인제스트 엔진(역방향 백필, 소스별 순차 디스패치,
//! 로테이션 감지)을 체크포인트 없이 사용합니다. 소스 하나라도 열지
//! 못하면 종료 코드가 0이 아닙니다.

mod cli;
mod error;
mod output;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use scorewatch_core::error::{HandlerError, ParseError};
use scorewatch_core::event::GameEvent;
use scorewatch_core::pipeline::{EventHandler, LineParser};
use scorewatch_ingest::{
    HandlerFailurePolicy, LineReader, LiveTailer, MemoryOffsetStore, RegexMarkers,
    RotationDetector, Source, SourceDispatcher, StreamIdentity, tail_lines,
};

use crate::cli::TailCli;
use crate::error::CliError;
use crate::output::SourceTag;

/// 폴링/정체성 재검사 주기 (진단 도구 고정값)
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(150);
const IDENTITY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1000);
/// 백필 역방향 스캔 청크
const SCAN_CHUNK: usize = 64 * 1024;
const QUEUE_DEPTH: usize = 1024;

/// 모든 라인을 그대로 이벤트로 감싸는 파서
struct RawLineParser;

impl LineParser for RawLineParser {
    fn name(&self) -> &str {
        "raw"
    }

    fn parse_line(&self, line: &str, source_id: &str) -> Result<Option<GameEvent>, ParseError> {
        Ok(Some(GameEvent::new(
            "raw_line",
            source_id,
            serde_json::json!({ "text": line }),
        )))
    }
}

/// `[<source>] <line>` 형식으로 출력하는 핸들러
struct PrintHandler {
    tag: SourceTag,
}

impl EventHandler for PrintHandler {
    async fn handle(&self, event: GameEvent, _source_path: &Path) -> Result<(), HandlerError> {
        let text = event.fields["text"].as_str().unwrap_or_default();
        self.tag.print_line(text);
        Ok(())
    }
}

/// 백필까지 끝낸 소스 하나
struct OpenedSource {
    source: Source,
    tag: SourceTag,
    /// 백필이 끝난 지점 — follow는 정확히 여기서 시작
    end_offset: u64,
}

#[tokio::main]
async fn main() {
    let cli = TailCli::parse();

    // 진단 도구는 기본적으로 조용히: RUST_LOG로만 내부 로그 노출
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("scorewatch-tail: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: TailCli) -> Result<i32, CliError> {
    let mut opened = Vec::new();
    let mut failures = 0usize;

    for (index, path) in cli.files.iter().enumerate() {
        match open_and_backfill(path, cli.lines, index).await {
            Ok(source) => opened.push(source),
            Err(e) => {
                eprintln!("scorewatch-tail: {e}");
                failures += 1;
            }
        }
    }

    let exit_code = if failures > 0 { 2 } else { 0 };

    if opened.is_empty() || !cli.follow {
        return Ok(exit_code);
    }

    follow(opened).await?;
    Ok(exit_code)
}

/// 소스를 열어 마지막 N라인을 출력하고 follow 시작점을 반환합니다.
async fn open_and_backfill(
    path: &Path,
    lines: usize,
    index: usize,
) -> Result<OpenedSource, CliError> {
    let source = Source::new(path).map_err(|e| CliError::FileOpen {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let sample = tail_lines(path, lines, SCAN_CHUNK)
        .await
        .map_err(|e| CliError::FileOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let tag = SourceTag::new(source.id(), index);
    for line in &sample.lines {
        tag.print_line(line);
    }

    Ok(OpenedSource {
        source,
        tag,
        end_offset: sample.end_offset,
    })
}

/// Ctrl+C가 올 때까지 모든 소스를 따라갑니다.
async fn follow(opened: Vec<OpenedSource>) -> Result<(), CliError> {
    let cancel = CancellationToken::new();
    let markers = Arc::new(RegexMarkers::with_defaults()?);
    let mut tails = Vec::new();
    let mut dispatchers = Vec::new();

    for entry in opened {
        let OpenedSource {
            source,
            tag,
            end_offset,
        } = entry;

        let dispatcher = SourceDispatcher::spawn(
            source.clone(),
            Arc::new(RawLineParser),
            Arc::new(PrintHandler { tag }),
            Arc::new(MemoryOffsetStore::new()),
            HandlerFailurePolicy::Advance,
            QUEUE_DEPTH,
        );
        let tx = dispatcher.sender();
        dispatchers.push(dispatcher);

        let reader = LineReader::open(&source, end_offset).await?;
        let identity = StreamIdentity::probe(source.path(), markers.as_ref()).await?;
        let detector = RotationDetector::new(identity, end_offset);

        let mut tailer = LiveTailer::new(
            source.clone(),
            reader,
            detector,
            markers.clone(),
            tx,
            POLL_INTERVAL,
            IDENTITY_INTERVAL,
        );
        let tail_cancel = cancel.clone();
        tails.push(tokio::spawn(async move {
            if let Err(e) = tailer.run(tail_cancel).await {
                warn!(source = source.id(), error = %e, "tail stopped with error");
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    cancel.cancel();

    for tail in tails {
        let _ = tail.await;
    }
    for dispatcher in dispatchers {
        dispatcher.shutdown().await;
    }

    Ok(())
}
