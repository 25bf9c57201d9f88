//! 리플레이 — 체크포인트(또는 콜드 스타트 지점)부터 EOF까지 따라잡기
//!
//! 라이브 테일 시작 전에 소스를 현재 EOF까지 동기적으로 전진시킵니다.
//! 종결자가 없는 마지막 부분 라인은 아직 레코드가 아니므로 소비하지
//! 않고 남겨둡니다. 핸드오프는 열린 [`LineReader`]를 그대로 테일러에
//! 넘기는 방식이라 공백도 중복도 생기지 않습니다.

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use scorewatch_core::metrics as m;

use crate::dispatch::{PendingItem, PendingLine};
use crate::error::IngestError;
use crate::source::Source;

/// 종결된 라인 단위로 파일을 전진 소비하는 리더
///
/// 오프셋 회계:
/// - `pos`: 파일 디스크립터에서 소비한 총 바이트 (미종결 캐리 포함)
/// - [`committed_pos`](Self::committed_pos): 마지막 종결 라인의 끝.
///   체크포인트는 항상 이 값 기준으로만 전진합니다.
pub struct LineReader {
    reader: BufReader<tokio::fs::File>,
    pos: u64,
    partial: Vec<u8>,
}

/// EOF까지 드레인한 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// EOF 도달 (보낸 종결 라인 수 포함)
    Eof { lines_sent: u64 },
    /// 셧다운 신호로 중단
    Cancelled,
}

impl LineReader {
    /// 파일을 열고 지정 오프셋에 위치한 리더를 생성합니다.
    pub async fn open(source: &Source, from: u64) -> Result<Self, IngestError> {
        let mut file = tokio::fs::File::open(source.path()).await?;
        file.seek(SeekFrom::Start(from)).await?;
        Ok(Self {
            reader: BufReader::new(file),
            pos: from,
            partial: Vec::new(),
        })
    }

    /// 마지막 종결 라인의 끝 오프셋을 반환합니다.
    pub fn committed_pos(&self) -> u64 {
        self.pos - self.partial.len() as u64
    }

    /// 현재 위치부터 EOF까지 종결된 라인을 모두 큐로 보냅니다.
    ///
    /// 미종결 꼬리 바이트는 내부 캐리에 남겨두었다가 다음 호출에서
    /// 이어 붙입니다. 같은 종결 라인이 두 번 전송되는 일은 없습니다.
    pub async fn drain_to_eof(
        &mut self,
        tx: &mpsc::Sender<PendingItem>,
        cancel: &CancellationToken,
    ) -> Result<DrainOutcome, IngestError> {
        let mut lines_sent = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Ok(DrainOutcome::Cancelled);
            }

            let mut buf = std::mem::take(&mut self.partial);
            let n = self.reader.read_until(b'\n', &mut buf).await?;

            if n == 0 {
                // EOF: 캐리를 되돌려 놓고 종료
                self.partial = buf;
                return Ok(DrainOutcome::Eof { lines_sent });
            }

            self.pos += n as u64;

            if buf.last() == Some(&b'\n') {
                let end_offset = self.pos;
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }

                let item = PendingItem::Line(PendingLine {
                    raw: Bytes::from(buf),
                    end_offset,
                });

                tokio::select! {
                    sent = tx.send(item) => {
                        sent.map_err(|e| IngestError::Channel(e.to_string()))?;
                    }
                    _ = cancel.cancelled() => return Ok(DrainOutcome::Cancelled),
                }
                lines_sent += 1;
            } else {
                // EOF에서 끊긴 부분 라인: 종결될 때까지 캐리로 보관
                self.partial = buf;
                return Ok(DrainOutcome::Eof { lines_sent });
            }
        }
    }
}

/// 리플레이 엔진 — 시작 오프셋부터 현재 EOF까지의 동기 캐치업
pub struct ReplayEngine;

impl ReplayEngine {
    /// 소스를 `from`부터 현재 EOF까지 전진시킵니다.
    ///
    /// 반환된 [`LineReader`]는 정확히 리플레이가 끝난 위치에 열려
    /// 있으므로 그대로 라이브 테일러에 넘깁니다.
    pub async fn replay(
        source: &Source,
        from: u64,
        tx: &mpsc::Sender<PendingItem>,
        cancel: &CancellationToken,
    ) -> Result<(LineReader, u64), IngestError> {
        let mut reader = LineReader::open(source, from).await?;

        let outcome = reader.drain_to_eof(tx, cancel).await?;
        let final_pos = reader.committed_pos();

        if let DrainOutcome::Eof { lines_sent } = outcome {
            metrics::counter!(m::INGEST_REPLAY_LINES_TOTAL, m::LABEL_SOURCE => source.id().to_owned())
                .increment(lines_sent);
            debug!(
                source = source.id(),
                from,
                to = final_pos,
                lines = lines_sent,
                "replay caught up to EOF"
            );
        }

        Ok((reader, final_pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> Source {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        Source::new(path).unwrap()
    }

    async fn drain_all(rx: &mut mpsc::Receiver<PendingItem>) -> Vec<PendingLine> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let PendingItem::Line(line) = item {
                out.push(line);
            }
        }
        out
    }

    #[tokio::test]
    async fn replay_from_zero_sends_all_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_file(&dir, "a.log", b"one\ntwo\nthree\n");
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let (_reader, final_pos) = ReplayEngine::replay(&source, 0, &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(final_pos, 14);
        let lines = drain_all(&mut rx).await;
        assert_eq!(lines.len(), 3);
        assert_eq!(&lines[0].raw[..], b"one");
        assert_eq!(lines[0].end_offset, 4);
        assert_eq!(&lines[2].raw[..], b"three");
        assert_eq!(lines[2].end_offset, 14);
    }

    #[tokio::test]
    async fn replay_from_checkpoint_skips_processed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_file(&dir, "a.log", b"one\ntwo\nthree\n");
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        // "one\n" 까지 처리된 체크포인트에서 재개
        let (_reader, final_pos) = ReplayEngine::replay(&source, 4, &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(final_pos, 14);
        let lines = drain_all(&mut rx).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[0].raw[..], b"two");
    }

    #[tokio::test]
    async fn partial_trailing_line_is_left_unconsumed() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_file(&dir, "a.log", b"one\ntwo\npart");
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let (reader, final_pos) = ReplayEngine::replay(&source, 0, &tx, &cancel)
            .await
            .unwrap();

        // 체크포인트 후보는 "two\n"의 끝이어야 함
        assert_eq!(final_pos, 8);
        assert_eq!(reader.committed_pos(), 8);
        let lines = drain_all(&mut rx).await;
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn partial_line_completes_on_next_drain() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_file(&dir, "a.log", b"one\npart");
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let (mut reader, _) = ReplayEngine::replay(&source, 0, &tx, &cancel)
            .await
            .unwrap();
        assert_eq!(drain_all(&mut rx).await.len(), 1);

        // 부분 라인이 종결됨
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(source.path())
                .unwrap();
            file.write_all(b"ial\nnext\n").unwrap();
        }

        reader.drain_to_eof(&tx, &cancel).await.unwrap();
        let lines = drain_all(&mut rx).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[0].raw[..], b"partial");
        assert_eq!(&lines[1].raw[..], b"next");
    }

    #[tokio::test]
    async fn crlf_lines_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_file(&dir, "a.log", b"one\r\ntwo\r\n");
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        ReplayEngine::replay(&source, 0, &tx, &cancel).await.unwrap();
        let lines = drain_all(&mut rx).await;
        assert_eq!(&lines[0].raw[..], b"one");
        // end_offset은 종결자를 포함한 원래 위치
        assert_eq!(lines[0].end_offset, 5);
    }

    #[tokio::test]
    async fn cancelled_replay_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_file(&dir, "a.log", b"one\ntwo\n");
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut reader = LineReader::open(&source, 0).await.unwrap();
        let outcome = reader.drain_to_eof(&tx, &cancel).await.unwrap();
        assert_eq!(outcome, DrainOutcome::Cancelled);
    }

    #[tokio::test]
    async fn replay_on_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::new(dir.path().join("gone.log")).unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let result = ReplayEngine::replay(&source, 0, &tx, &cancel).await;
        assert!(matches!(result, Err(IngestError::Io(_))));
    }
}
