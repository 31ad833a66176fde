use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::check_cancelled;
use crate::constants::ERROR_SERVER_UNAVAILABLE;
use crate::error::EngineError;

/// POST a JSON body, racing the whole exchange up to the response headers
/// against the cancellation token. Both server routes the engine talks to
/// (`/completion`, `/tokenize`) are JSON POSTs; health probes bypass this
/// and go through the client directly since they carry their own cadence.
pub async fn post_json<B: Serialize>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, EngineError> {
    check_cancelled!(cancel);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::request_cancelled()),
        result = client.post(url).json(body).send() => {
            result.map_err(|err| classify_send_error(url, err))
        }
    }
}

/// Map a non-2xx response to a network error tagged with the route, so
/// failures fail the call before any payload is consumed.
pub fn require_success(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(EngineError::network(&format!(
            "{} request failed: {}",
            what, status
        )))
    }
}

fn classify_send_error(url: &str, err: reqwest::Error) -> EngineError {
    let message = if err.is_connect() {
        ERROR_SERVER_UNAVAILABLE
    } else if err.is_timeout() {
        "request timed out"
    } else {
        "request failed"
    };
    log::error!("[http] {} {}: {}", url, message, err);
    EngineError::network(message)
}
