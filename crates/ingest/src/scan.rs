//! 역방향 스캔 — 콜드 스타트 재개 지점 탐색과 마지막 N라인 추출
//!
//! 체크포인트 없이 이미 수 시간 분량이 쌓인 파일에 붙을 때, 바이트 0부터의
//! 리플레이는 과거 매치 전부를 새 매치로 재생해 버립니다. 대신 EOF에서
//! 역방향으로 스캔하여 가장 최근의 맵 전환 마커(없으면 서버 기동 마커)를
//! 찾고 거기서부터 전방 처리를 시작합니다.
//!
//! 스캔은 청크 단위 버퍼 읽기로 수행합니다. 바이트 단위 seek의
//! 라인 경계 의미는 유지하되 syscall 수는 청크당 1회로 줄입니다.
//! 전체 파일을 메모리에 올리지 않으며, 마커를 찾는 즉시 중단합니다.

use std::path::Path;

use scorewatch_core::pipeline::LineMarkers;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::debug;

use crate::error::IngestError;

/// 역방향 스캔이 돌려주는 라인 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine {
    /// 라인 첫 바이트의 파일 오프셋
    pub offset: u64,
    /// 종결자(`\n`, `\r\n`)를 제거한 라인 텍스트
    pub text: String,
}

/// 마지막 N라인 추출 결과
#[derive(Debug, Clone)]
pub struct TailSample {
    /// 파일 순서대로 정렬된 마지막 라인들
    pub lines: Vec<String>,
    /// 스캔 시점의 EOF 오프셋 (이어서 follow할 때의 시작점)
    pub end_offset: u64,
}

/// EOF에서 시작해 라인을 역순으로 돌려주는 스캐너
///
/// 내부 버퍼는 항상 `[win_lo, line_end)` 구간만 들고 있습니다.
/// 라인을 하나 내보낼 때마다 버퍼 뒤쪽을 잘라내므로, 메모리 사용량은
/// 청크 크기 + 가장 긴 라인 길이로 제한됩니다.
pub struct ReverseLineScanner {
    file: tokio::fs::File,
    chunk_size: usize,
    /// 열었을 때의 파일 길이
    len: u64,
    buf: Vec<u8>,
    /// buf[0]의 파일 오프셋
    win_lo: u64,
    /// 다음에 내보낼 라인의 exclusive 끝 오프셋
    line_end: u64,
}

impl ReverseLineScanner {
    /// 파일을 열고 EOF에 위치한 스캐너를 생성합니다.
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, IngestError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            file,
            chunk_size: chunk_size.max(1),
            len,
            buf: Vec::new(),
            win_lo: len,
            line_end: len,
        })
    }

    /// 스캔 시작 시점의 파일 길이(EOF 오프셋)를 반환합니다.
    pub fn end_offset(&self) -> u64 {
        self.len
    }

    /// 다음 라인을 역순으로 반환합니다. 파일 시작에 도달하면 None.
    pub async fn next_line(&mut self) -> Result<Option<ScannedLine>, IngestError> {
        if self.line_end == 0 {
            return Ok(None);
        }

        loop {
            let rel_end = (self.line_end - self.win_lo) as usize;

            if rel_end > 0 {
                // 후보 라인의 마지막 바이트가 종결자면 검색에서 제외
                let search_end = if self.buf[rel_end - 1] == b'\n' {
                    rel_end - 1
                } else {
                    rel_end
                };

                if let Some(j) = self.buf[..search_end].iter().rposition(|&b| b == b'\n') {
                    let start = self.win_lo + j as u64 + 1;
                    let line = Self::to_text(&self.buf[j + 1..rel_end]);
                    self.line_end = start;
                    self.buf.truncate(j + 1);
                    return Ok(Some(ScannedLine {
                        offset: start,
                        text: line,
                    }));
                }
            }

            if self.win_lo == 0 {
                // 파일 시작까지 종결자가 없음: 남은 구간 전체가 첫 라인
                let line = Self::to_text(&self.buf[..rel_end]);
                self.line_end = 0;
                self.buf.clear();
                return Ok(Some(ScannedLine {
                    offset: 0,
                    text: line,
                }));
            }

            self.refill().await?;
        }
    }

    /// 윈도 앞쪽에 청크 하나를 더 읽어 붙입니다.
    async fn refill(&mut self) -> Result<(), IngestError> {
        let new_lo = self.win_lo.saturating_sub(self.chunk_size as u64);
        let read_len = (self.win_lo - new_lo) as usize;

        self.file.seek(SeekFrom::Start(new_lo)).await?;
        let mut chunk = vec![0u8; read_len];
        self.file.read_exact(&mut chunk).await?;

        chunk.extend_from_slice(&self.buf);
        self.buf = chunk;
        self.win_lo = new_lo;
        Ok(())
    }

    fn to_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes)
            .trim_end_matches(['\n', '\r'])
            .to_owned()
    }
}

/// 콜드 스타트 재개 지점을 찾습니다.
///
/// EOF에서 역방향으로 스캔하며 처음 만나는 구조 마커에서 멈춥니다.
/// 역방향이므로 처음 만나는 마커가 곧 파일에서 가장 최근 마커이고,
/// 그것이 서버 기동 마커라면 그 뒤에 맵 전환이 없다는 뜻입니다.
/// 즉 "맵 전환 우선, 없으면 서버 기동" 폴백이 한 번의 패스로 나오고,
/// 서버 기동 마커에서 스캔이 멈추므로 탐색 범위도 그에 묶입니다.
/// 어느 마커도 없으면 0을 반환합니다.
pub async fn locate_resume_offset<M: LineMarkers>(
    path: &Path,
    markers: &M,
    chunk_size: usize,
) -> Result<u64, IngestError> {
    let mut scanner = ReverseLineScanner::open(path, chunk_size).await?;

    while let Some(line) = scanner.next_line().await? {
        if markers.is_map_change(&line.text) {
            debug!(
                path = %path.display(),
                offset = line.offset,
                "cold start: resuming at last map change"
            );
            return Ok(line.offset);
        }
        if markers.is_server_start(&line.text) {
            debug!(
                path = %path.display(),
                offset = line.offset,
                "cold start: no map change found, resuming at server start"
            );
            return Ok(line.offset);
        }
    }

    debug!(path = %path.display(), "cold start: no markers found, starting from 0");
    Ok(0)
}

/// 파일의 마지막 N라인을 파일 순서대로 반환합니다.
///
/// 진단 CLI의 초기 백필에 사용됩니다. 반환된 `end_offset`에서
/// follow를 시작하면 백필과 라이브 테일 사이에 공백/중복이 없습니다.
pub async fn tail_lines(
    path: &Path,
    count: usize,
    chunk_size: usize,
) -> Result<TailSample, IngestError> {
    let mut scanner = ReverseLineScanner::open(path, chunk_size).await?;
    let end_offset = scanner.end_offset();

    let mut lines = Vec::with_capacity(count.min(1024));
    while lines.len() < count {
        match scanner.next_line().await? {
            Some(line) => lines.push(line.text),
            None => break,
        }
    }
    lines.reverse();

    Ok(TailSample { lines, end_offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::RegexMarkers;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    async fn collect_reverse(path: &Path, chunk: usize) -> Vec<ScannedLine> {
        let mut scanner = ReverseLineScanner::open(path, chunk).await.unwrap();
        let mut lines = Vec::new();
        while let Some(line) = scanner.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn scans_lines_in_reverse_with_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.log", b"one\ntwo\nthree\n");

        let lines = collect_reverse(&path, 4096).await;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], ScannedLine { offset: 8, text: "three".to_owned() });
        assert_eq!(lines[1], ScannedLine { offset: 4, text: "two".to_owned() });
        assert_eq!(lines[2], ScannedLine { offset: 0, text: "one".to_owned() });
    }

    #[tokio::test]
    async fn tiny_chunks_preserve_line_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.log", b"alpha\nbravo charlie\nd\n");

        // 청크가 라인보다 작아도 결과는 동일해야 함
        let big = collect_reverse(&path, 4096).await;
        let small = collect_reverse(&path, 2).await;
        assert_eq!(big, small);
    }

    #[tokio::test]
    async fn handles_missing_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.log", b"one\ntwo\npartial");

        let lines = collect_reverse(&path, 4).await;
        assert_eq!(lines[0].text, "partial");
        assert_eq!(lines[0].offset, 8);
        assert_eq!(lines[2].text, "one");
    }

    #[tokio::test]
    async fn handles_crlf_terminators() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.log", b"one\r\ntwo\r\n");

        let lines = collect_reverse(&path, 4096).await;
        assert_eq!(lines[0].text, "two");
        assert_eq!(lines[0].offset, 5);
        assert_eq!(lines[1].text, "one");
    }

    #[tokio::test]
    async fn empty_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.log", b"");
        assert!(collect_reverse(&path, 4096).await.is_empty());
    }

    #[tokio::test]
    async fn locate_prefers_most_recent_map_change() {
        let dir = tempfile::tempdir().unwrap();
        let content = b"log opened at 2026-08-01 18:00:00\n\
            initial map load: dm1\n\
            player alpha connected\n\
            changing map to dm2\n\
            player bravo connected\n\
            changing map to dm3\n\
            frag: alpha -> bravo\n";
        let path = write_file(&dir, "a.log", content);
        let markers = RegexMarkers::with_defaults().unwrap();

        let offset = locate_resume_offset(&path, &markers, 16).await.unwrap();

        // 마지막 "changing map to dm3" 라인의 시작 오프셋이어야 함
        let expected = content
            .windows("changing map to dm3".len())
            .rposition(|w| w == b"changing map to dm3")
            .unwrap() as u64;
        assert_eq!(offset, expected);
    }

    #[tokio::test]
    async fn locate_falls_back_to_server_start() {
        let dir = tempfile::tempdir().unwrap();
        let content = b"log opened at 2026-08-01 18:00:00\n\
            initial map load: dm1\n\
            player alpha connected\n\
            frag: alpha -> bravo\n";
        let path = write_file(&dir, "a.log", content);
        let markers = RegexMarkers::with_defaults().unwrap();

        let offset = locate_resume_offset(&path, &markers, 16).await.unwrap();
        assert_eq!(offset, 34); // "initial map load: dm1" 라인 시작
    }

    #[tokio::test]
    async fn locate_without_markers_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.log", b"noise\nmore noise\n");
        let markers = RegexMarkers::with_defaults().unwrap();

        let offset = locate_resume_offset(&path, &markers, 8).await.unwrap();
        assert_eq!(offset, 0);
    }

    #[tokio::test]
    async fn tail_lines_returns_file_order_and_end_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.log", b"one\ntwo\nthree\nfour\n");

        let sample = tail_lines(&path, 2, 4096).await.unwrap();
        assert_eq!(sample.lines, vec!["three", "four"]);
        assert_eq!(sample.end_offset, 19);
    }

    #[tokio::test]
    async fn tail_lines_caps_at_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.log", b"one\ntwo\n");

        let sample = tail_lines(&path, 10, 4096).await.unwrap();
        assert_eq!(sample.lines, vec!["one", "two"]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// 역방향 스캔은 전방 분할과 같은 라인 집합을 내야 한다
            #[test]
            fn reverse_scan_matches_forward_split(
                lines in proptest::collection::vec("[a-z ]{0,12}", 0..20),
                trailing_newline in any::<bool>(),
                chunk in 1usize..64,
            ) {
                let mut content = lines.join("\n");
                if !lines.is_empty() && trailing_newline {
                    content.push('\n');
                }

                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let scanned = rt.block_on(async {
                    let dir = tempfile::tempdir().unwrap();
                    let path = dir.path().join("prop.log");
                    tokio::fs::write(&path, &content).await.unwrap();
                    collect_reverse(&path, chunk).await
                });

                let mut forward: Vec<String> = if content.is_empty() {
                    Vec::new()
                } else {
                    content
                        .strip_suffix('\n')
                        .unwrap_or(&content)
                        .split('\n')
                        .map(ToOwned::to_owned)
                        .collect()
                };
                forward.reverse();

                let scanned_texts: Vec<String> =
                    scanned.iter().map(|l| l.text.clone()).collect();
                prop_assert_eq!(scanned_texts, forward);
            }
        }
    }
}
