//! Default parser/handler collaborators for standalone operation.
//!
//! The ingest engine is parser-agnostic; when the daemon runs without a
//! game-specific parser plugged in, every line is forwarded as a
//! `raw_line` event and the handler emits it to the structured log.
//! Downstream deployments replace these with real implementations.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use scorewatch_core::error::{HandlerError, ParseError};
use scorewatch_core::event::GameEvent;
use scorewatch_core::pipeline::{EventHandler, LineParser};

/// Wraps every non-empty line into a `raw_line` event.
#[derive(Debug, Default)]
pub struct PassthroughParser;

impl LineParser for PassthroughParser {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn parse_line(&self, line: &str, source_id: &str) -> Result<Option<GameEvent>, ParseError> {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(GameEvent::new(
            "raw_line",
            source_id,
            serde_json::json!({ "text": trimmed }),
        )))
    }
}

/// Emits each event to the structured log and counts deliveries.
#[derive(Debug, Default)]
pub struct LoggingHandler {
    delivered: AtomicU64,
}

impl LoggingHandler {
    /// Number of events delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl EventHandler for LoggingHandler {
    async fn handle(&self, event: GameEvent, source_path: &Path) -> Result<(), HandlerError> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            source = event.source_id,
            kind = event.kind,
            path = %source_path.display(),
            "event delivered"
        );
        Ok(())
    }
}
