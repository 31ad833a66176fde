use serde::Deserialize;

use crate::constants::{
    FRAME_FIELD_DATA, FRAME_FIELD_ERROR, SLOT_UNAVAILABLE_NEEDLE, STREAM_BUFFER_CAPACITY_HINT,
};
use crate::error::EngineError;

/// One decoded generation delta from a `data:` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationDelta {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub slot_id: Option<i64>,
    #[serde(default)]
    pub timings: Option<Timings>,
}

/// Server-side timing block attached to the final delta.
#[derive(Debug, Clone, Deserialize)]
pub struct Timings {
    #[serde(default)]
    pub prompt_n: Option<f64>,
    #[serde(default)]
    pub prompt_ms: Option<f64>,
    #[serde(default)]
    pub prompt_per_second: Option<f64>,
    #[serde(default)]
    pub predicted_n: Option<f64>,
    #[serde(default)]
    pub predicted_ms: Option<f64>,
    #[serde(default)]
    pub predicted_per_second: Option<f64>,
}

#[derive(Deserialize)]
struct ErrorFrame {
    #[serde(default)]
    content: String,
}

/// Incremental parser for the server's `key: value` line framing.
///
/// Network chunks align with neither line boundaries nor character
/// boundaries, so raw bytes up to the last `'\n'` seen are decoded and
/// everything after it, partial multibyte sequences included, stays in
/// `leftover` until the line completes. Lines that do not match the
/// framing (keep-alive pings, blank lines) are skipped. The parser is
/// finished once a delta carries the stop flag; later input is ignored.
pub struct FrameParser {
    leftover: Vec<u8>,
    accumulated: String,
    finished: bool,
    pending_error: Option<EngineError>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            leftover: Vec::new(),
            accumulated: String::with_capacity(STREAM_BUFFER_CAPACITY_HINT),
            finished: false,
            pending_error: None,
        }
    }

    /// Everything accumulated from `data:` frames so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// True once a stop-flagged delta or a fatal error frame has been
    /// seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// A fatal error frame, handed out once. Deltas decoded from the same
    /// chunk are returned by `push_chunk` first, so callers deliver them
    /// before surfacing this.
    pub fn take_error(&mut self) -> Option<EngineError> {
        self.pending_error.take()
    }

    /// Feed one chunk of raw response bytes; returns the deltas completed
    /// by it. Only a completed line that is not valid UTF-8 is an error;
    /// an `error:` frame other than the distinguished slot-unavailable
    /// condition is logged and skipped.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<Vec<GenerationDelta>, EngineError> {
        let mut deltas = Vec::new();
        if self.finished {
            return Ok(deltas);
        }

        self.leftover.extend_from_slice(chunk);
        let Some(last_newline) = self.leftover.iter().rposition(|&byte| byte == b'\n') else {
            return Ok(deltas);
        };

        let rest = self.leftover.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.leftover, rest);
        let text = std::str::from_utf8(&complete)
            .map_err(|_| EngineError::stream_protocol("invalid UTF-8 in stream"))?;

        for line in text.lines() {
            let Some((field, value)) = split_frame(line) else {
                continue;
            };

            match field {
                FRAME_FIELD_DATA => match serde_json::from_str::<GenerationDelta>(value) {
                    Ok(delta) => {
                        self.accumulated.push_str(&delta.content);
                        let stop = delta.stop;
                        deltas.push(delta);
                        if stop {
                            self.finished = true;
                            break;
                        }
                    }
                    Err(e) => {
                        log::error!("[stream] undecodable data frame: {}", e);
                    }
                },
                FRAME_FIELD_ERROR => {
                    let content = serde_json::from_str::<ErrorFrame>(value)
                        .map(|frame| frame.content)
                        .unwrap_or_else(|_| value.to_string());
                    if content.contains(SLOT_UNAVAILABLE_NEEDLE) {
                        self.finished = true;
                        self.pending_error = Some(EngineError::slot_unavailable());
                        break;
                    }
                    log::error!("[stream] server error frame: {}", content);
                }
                _ => {}
            }
        }

        Ok(deltas)
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Match the `key: value` framing: a non-empty whitespace-free key, a
/// colon, one space, then the payload.
fn split_frame(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return None;
    }
    rest.strip_prefix(' ').map(|value| (key, value))
}
