use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::check_cancelled;
use crate::completion::params::{SamplingParams, build_completion_body};
use crate::completion::parser::{FrameParser, GenerationDelta};
use crate::constants::{ROUTE_COMPLETION, STREAM_TIMEOUT_SECONDS};
use crate::error::EngineError;
use crate::http::{post_json, require_success};
use crate::logging::log_timed;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Allocate a correlation id for one completion attempt; shows up in
/// every log line of that request.
pub fn next_correlation_id() -> u64 {
    REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed) % 1_000_000
}

/// One streaming completion attempt. Transient; owned by the call that
/// built it and never shared across requests.
pub struct CompletionRequest {
    pub prompt: String,
    pub params: SamplingParams,
    /// Caller-supplied sampling overrides, passed through opaquely.
    pub overrides: Map<String, Value>,
    pub cancel: CancellationToken,
    pub correlation_id: u64,
}

impl CompletionRequest {
    pub fn new(prompt: String, params: SamplingParams, cancel: CancellationToken) -> Self {
        Self {
            prompt,
            params,
            overrides: Map::new(),
            cancel,
            correlation_id: next_correlation_id(),
        }
    }
}

/// Issue one streaming request against `{base_url}/completion` and return
/// the lazy sequence of decoded deltas.
///
/// The sequence is finite and not restartable. It ends after the first
/// stop-flagged delta, at server end-of-stream, or on cancellation; an
/// aborted stream simply ends, with no error item, so callers can tell
/// "user moved on" apart from "server failed". A non-2xx response fails
/// the call before any delta is produced.
pub async fn stream_completion(
    client: &reqwest::Client,
    base_url: &str,
    request: CompletionRequest,
) -> Result<UnboundedReceiverStream<Result<GenerationDelta, EngineError>>, EngineError> {
    check_cancelled!(request.cancel);

    let component = format!("completion:{:06}", request.correlation_id);
    let start_time = Instant::now();
    let url = format!("{}{}", base_url, ROUTE_COMPLETION);
    let body = build_completion_body(&request.prompt, &request.params, &request.overrides);

    let response = post_json(client, &url, &body, &request.cancel).await?;
    let response = require_success(response, "completion")?;

    let (tx, rx) = mpsc::unbounded_channel::<Result<GenerationDelta, EngineError>>();
    let cancel = request.cancel.clone();

    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        let mut parser = FrameParser::new();
        let mut delta_count = 0u64;

        'stream_loop: loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // Normal termination: drop the channel without an
                    // error item and release the connection.
                    log::info!("[{}] Request: canceled", component);
                    break 'stream_loop;
                }

                chunk_result = timeout(Duration::from_secs(STREAM_TIMEOUT_SECONDS), stream.next()) => {
                    match chunk_result {
                        Ok(Some(Ok(bytes_chunk))) => {
                            match parser.push_chunk(&bytes_chunk) {
                                Ok(deltas) => {
                                    for delta in deltas {
                                        delta_count += 1;
                                        if tx.send(Ok(delta)).is_err() {
                                            break 'stream_loop;
                                        }
                                    }
                                    // Deltas decoded ahead of a fatal error
                                    // frame were delivered above; the error
                                    // goes out last.
                                    if let Some(e) = parser.take_error() {
                                        let _ = tx.send(Err(e));
                                        break 'stream_loop;
                                    }
                                    if parser.is_finished() {
                                        break 'stream_loop;
                                    }
                                }
                                Err(e) => {
                                    let _ = tx.send(Err(e));
                                    break 'stream_loop;
                                }
                            }
                        }
                        Ok(Some(Err(e))) => {
                            let _ = tx.send(Err(EngineError::network(&format!(
                                "streaming error: {}", e
                            ))));
                            break 'stream_loop;
                        }
                        Ok(None) => break 'stream_loop,
                        Err(_) => {
                            let _ = tx.send(Err(EngineError::network("stream timeout")));
                            break 'stream_loop;
                        }
                    }
                }
            }
        }

        log_timed(
            &component,
            &format!(
                "stream completed | {} deltas, {} chars",
                delta_count,
                parser.accumulated().chars().count()
            ),
            start_time,
        );
    });

    Ok(UnboundedReceiverStream::new(rx))
}
