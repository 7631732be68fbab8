use serde::{Deserialize, Serialize};

use super::models::{Candidate, ColumnCounts, SessionUser};
use crate::errors::GatewayError;

/// SSE event name carrying candidate changes.
pub const CANDIDATE_UPDATED: &str = "candidate_updated";

/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_BYTES: usize = 256 * 1024;

// ── Live update payloads ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Add,
    Update,
}

/// A collaborator-visible change to one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateEvent {
    pub kind: EventKind,
    pub candidate: Candidate,
    /// Who made the change.
    pub user: SessionUser,
    #[serde(default)]
    pub columns: Option<ColumnCounts>,
}

impl CandidateEvent {
    pub fn parse(data: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(data).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

// ── Server-sent event framing ────────────────────────────────────────

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes may arrive split at arbitrary points (including inside a UTF-8
/// sequence); only complete lines are interpreted. Frames are dispatched on
/// a blank line, and only when at least one `data:` line was seen.
#[derive(Debug)]
pub struct SseDecoder {
    pending: Vec<u8>,
    max_line: usize,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            event: None,
            data: Vec::new(),
            id: None,
        }
    }

    /// Feed a chunk, returning every frame it completed.
    ///
    /// Fails once an unterminated line outgrows the limit; the buffered
    /// bytes are dropped and the stream should be abandoned.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, GatewayError> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        if self.pending.len() > self.max_line {
            let buffered = self.pending.len();
            self.pending = Vec::new();
            return Err(GatewayError::Stream(format!(
                "event stream line exceeds {} bytes ({} buffered)",
                self.max_line, buffered
            )));
        }
        Ok(frames)
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry` and unknown fields are ignored; reconnect timing is ours.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data, id })
    }
}
