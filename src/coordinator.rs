use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::completion::{
    CompletionRequest, GenerationDelta, SamplingParams, next_correlation_id, stream_completion,
};
use crate::config::EngineConfig;
use crate::endpoint::{CommandSpawner, EndpointRegistry, ModelKind, ProcessSpawner};
use crate::error::EngineError;
use crate::logging::{log_component, log_component_error};
use crate::prompt::{ContextDocument, HttpTokenCounter, build_fim_prompt};
use crate::provision::ArtifactProvisioner;

/// Everything the editor side hands over for one completion attempt.
#[derive(Debug, Clone)]
pub struct CompletionContext {
    /// Logical slot identity (e.g. the document URI). A new request for
    /// the same id supersedes the previous one.
    pub context_id: String,
    /// Workspace-relative name of the active document.
    pub document_name: String,
    pub text_before: String,
    pub text_after: String,
    /// Other open documents, highest priority first.
    pub context_documents: Vec<ContextDocument>,
    pub kind: ModelKind,
    /// Opaque sampling overrides passed through to the server.
    pub overrides: Map<String, Value>,
}

/// Lifecycle phases of one request; used for log correlation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestPhase {
    Debouncing,
    Dispatching,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl RequestPhase {
    fn label(&self) -> &'static str {
        match self {
            RequestPhase::Debouncing => "debouncing",
            RequestPhase::Dispatching => "dispatching",
            RequestPhase::Streaming => "streaming",
            RequestPhase::Completed => "completed",
            RequestPhase::Cancelled => "cancelled",
            RequestPhase::Failed => "failed",
        }
    }
}

/// Counts requests in flight; observers watch it to drive a busy
/// indicator. The RAII guard guarantees the count drops back on every
/// exit path, including errors.
pub struct BusyTracker {
    tx: watch::Sender<usize>,
}

impl BusyTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    pub fn acquire(&self) -> BusyGuard {
        self.tx.send_modify(|count| *count += 1);
        BusyGuard {
            tx: self.tx.clone(),
        }
    }

    pub fn watch(&self) -> watch::Receiver<usize> {
        self.tx.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        *self.tx.borrow() > 0
    }
}

impl Default for BusyTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BusyGuard {
    tx: watch::Sender<usize>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.tx.send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// Glue between editor events and the engine: debounces, supersedes
/// stale requests, fits the prompt, streams the completion back.
pub struct CompletionCoordinator<P, S: ProcessSpawner = CommandSpawner> {
    registry: Arc<EndpointRegistry<P, S>>,
    active: Mutex<HashMap<String, CancellationToken>>,
    busy: BusyTracker,
    config: EngineConfig,
}

impl<P: ArtifactProvisioner, S: ProcessSpawner> CompletionCoordinator<P, S> {
    pub fn new(registry: Arc<EndpointRegistry<P, S>>, config: EngineConfig) -> Self {
        Self {
            registry,
            active: Mutex::new(HashMap::new()),
            busy: BusyTracker::new(),
            config,
        }
    }

    pub fn busy(&self) -> &BusyTracker {
        &self.busy
    }

    /// Run one completion lifecycle. Returns `Ok(None)` when the request
    /// was cancelled or superseded before dispatch — cancellation is
    /// never an error. Otherwise yields the stream of text deltas; a
    /// cancelled or failed stream simply ends early.
    pub async fn request_completion(
        &self,
        context: CompletionContext,
    ) -> Result<Option<UnboundedReceiverStream<String>>, EngineError> {
        let token = self.supersede(&context.context_id);
        let correlation_id = next_correlation_id();
        let component = format!("completion:{:06}", correlation_id);

        log_phase(&component, RequestPhase::Debouncing);
        tokio::select! {
            _ = sleep(Duration::from_millis(self.config.debounce_ms)) => {}
            _ = token.cancelled() => {
                log_phase(&component, RequestPhase::Cancelled);
                return Ok(None);
            }
        }

        let guard = self.busy.acquire();
        log_phase(&component, RequestPhase::Dispatching);

        let result = self
            .dispatch(&context, token.clone(), correlation_id, &component)
            .await;

        let stream = match result {
            Ok(stream) => stream,
            Err(e) if e.is_cancelled() => {
                log_phase(&component, RequestPhase::Cancelled);
                return Ok(None);
            }
            Err(e) => {
                log_component_error(&component, &e.to_string());
                log_phase(&component, RequestPhase::Failed);
                return Err(e);
            }
        };

        log_phase(&component, RequestPhase::Streaming);
        let (tx, rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            // The guard lives for the whole forwarding task, so the busy
            // indicator returns to idle on every exit path.
            let _guard = guard;
            let mut stream = stream;
            let mut failed = false;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(delta) => {
                        if !delta.content.is_empty() && tx.send(delta.content).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        // Slot exhaustion included: surfaced and logged,
                        // but never tears down the endpoint.
                        log_component_error(&component, &e.to_string());
                        failed = true;
                        break;
                    }
                }
            }

            if token.is_cancelled() {
                log_phase(&component, RequestPhase::Cancelled);
            } else if failed {
                log_phase(&component, RequestPhase::Failed);
            } else {
                log_phase(&component, RequestPhase::Completed);
            }
        });

        Ok(Some(UnboundedReceiverStream::new(rx)))
    }

    /// Cancel whatever is in flight for a context without replacing it.
    pub fn cancel_active(&self, context_id: &str) {
        if let Some(token) = self
            .active
            .lock()
            .expect("active request lock")
            .remove(context_id)
        {
            token.cancel();
        }
    }

    /// Cancel the previous request for this context and register a fresh
    /// token, so only the newest request's output is ever surfaced.
    fn supersede(&self, context_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .active
            .lock()
            .expect("active request lock")
            .insert(context_id.to_string(), token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    async fn dispatch(
        &self,
        context: &CompletionContext,
        token: CancellationToken,
        correlation_id: u64,
        component: &str,
    ) -> Result<UnboundedReceiverStream<Result<GenerationDelta, EngineError>>, EngineError> {
        let base_url = self.registry.base_url(context.kind)?;
        let client = self.registry.client().clone();

        let counter = HttpTokenCounter::new(client.clone(), base_url.clone(), token.clone());
        let prompt = build_fim_prompt(
            &counter,
            &context.document_name,
            &context.text_before,
            &context.text_after,
            &context.context_documents,
            self.config.max_prompt_tokens,
        )
        .await?;

        log_component(component, "Request: started");

        let mut request = CompletionRequest::new(prompt, SamplingParams::default(), token);
        request.overrides = context.overrides.clone();
        request.correlation_id = correlation_id;

        stream_completion(&client, &base_url, request).await
    }
}

fn log_phase(component: &str, phase: RequestPhase) {
    log::debug!("[{}] phase: {}", component, phase.label());
}
