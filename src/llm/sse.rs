//! Incremental decoder for `OpenAI`-style server-sent completion streams
//!
//! Bytes arrive in arbitrary chunks; lines (and UTF-8 sequences) may be split
//! anywhere. Only complete lines are decoded.

use super::LlmError;
use serde::Deserialize;

/// A decoded stream frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Payload of a `data:` line
    Data(String),
    /// The `[DONE]` terminator
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = Self::decode_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Option<SseFrame> {
        let line = std::mem::take(&mut self.buffer);
        Self::decode_line(&line)
    }

    fn decode_line(raw: &[u8]) -> Option<SseFrame> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);

        // Blank separators, comments and non-data fields carry no payload
        let payload = line.strip_prefix("data:")?.trim_start();
        if payload.trim() == "[DONE]" {
            Some(SseFrame::Done)
        } else if payload.is_empty() {
            None
        } else {
            Some(SseFrame::Data(payload.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorChunk {
    error: StreamErrorBody,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

/// Extract the text fragment from a `data:` payload.
///
/// Chunks without content (role announcements, usage trailers) yield `None`.
pub fn parse_delta(payload: &str) -> Result<Option<String>, LlmError> {
    if let Ok(err) = serde_json::from_str::<StreamErrorChunk>(payload) {
        return Err(LlmError::server_error(format!(
            "Provider error mid-stream: {}",
            err.error.message
        )));
    }

    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| LlmError::malformed(format!("Failed to parse stream chunk: {e}")))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty()))
}
