use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::constants::ROUTE_TOKENIZE;
use crate::error::EngineError;
use crate::http::{post_json, require_success};

/// Counts model tokens in a string. Deterministic for a given text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> impl Future<Output = Result<usize, EngineError>> + Send;
}

#[derive(Serialize)]
struct TokenizeRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct TokenizeResponse {
    tokens: Vec<i64>,
}

/// Token counting backed by the server's `/tokenize` route, so counts
/// come from the exact tokenizer of the model being prompted.
pub struct HttpTokenCounter {
    client: reqwest::Client,
    base_url: String,
    cancel: CancellationToken,
}

impl HttpTokenCounter {
    pub fn new(client: reqwest::Client, base_url: String, cancel: CancellationToken) -> Self {
        Self {
            client,
            base_url,
            cancel,
        }
    }
}

impl TokenCounter for HttpTokenCounter {
    async fn count(&self, text: &str) -> Result<usize, EngineError> {
        let url = format!("{}{}", self.base_url, ROUTE_TOKENIZE);
        let response = post_json(
            &self.client,
            &url,
            &TokenizeRequest { content: text },
            &self.cancel,
        )
        .await?;

        let body = require_success(response, "tokenize")?
            .json::<TokenizeResponse>()
            .await
            .map_err(|e| EngineError::network(&format!("invalid tokenize response: {}", e)))?;
        Ok(body.tokens.len())
    }
}
