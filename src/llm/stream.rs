//! Incremental decoding of `text/event-stream` completion bodies
//!
//! Network chunks do not respect line (or UTF-8) boundaries, so bytes are
//! buffered until a full line is available.

use super::{FragmentStream, LlmError};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

/// What a single event-stream line means to us
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine {
    Fragment(String),
    Done,
    Skip,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: String,
}

/// Line splitter over raw bytes
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed bytes, returning every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line));
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

/// Interpret one event-stream line
pub fn parse_line(line: &str) -> Result<SseLine, LlmError> {
    let Some(payload) = line.strip_prefix("data:") else {
        // Comments, `event:` and blank separators carry no text
        return Ok(SseLine::Skip);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(SseLine::Skip);
    }
    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: CompletionChunk = serde_json::from_str(payload)
        .map_err(|e| LlmError::stream(format!("Malformed stream chunk: {e}")))?;
    if let Some(error) = chunk.error {
        return Err(LlmError::stream(error.message));
    }

    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();
    if text.is_empty() {
        Ok(SseLine::Skip)
    } else {
        Ok(SseLine::Fragment(text))
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    lines: LineBuffer,
    ready: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl<S> DecodeState<S> {
    /// Queue the outcome of each line; stops at `[DONE]` or the first error
    fn absorb(&mut self, lines: Vec<String>) {
        for line in lines {
            match parse_line(&line) {
                Ok(SseLine::Fragment(text)) => self.ready.push_back(Ok(text)),
                Ok(SseLine::Skip) => {}
                Ok(SseLine::Done) => {
                    self.finished = true;
                    return;
                }
                Err(e) => {
                    self.ready.push_back(Err(e));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turn a byte stream of completion events into a fragment stream.
///
/// Ends after `[DONE]`, after the body closes, or right after yielding an
/// error.
pub fn decode_event_stream<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = DecodeState {
        body: Box::pin(body),
        lines: LineBuffer::default(),
        ready: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let lines = state.lines.push(bytes.as_ref());
                    state.absorb(lines);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(LlmError::stream(format!("Read failed: {e}"))), state));
                }
                None => {
                    let tail = state.lines.finish().into_iter().collect();
                    state.absorb(tail);
                    state.finished = true;
                }
            }
        }
    }))
}
