use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use tokio::time::sleep;

use crate::config::EngineConfig;
use crate::coordinator::{BusyTracker, CompletionContext, CompletionCoordinator};
use crate::endpoint::kind::ModelKind;
use crate::endpoint::supervisor::{EndpointRegistry, EndpointStatus};
use crate::error::EngineError;
use crate::provision::{ArtifactId, ArtifactProvisioner};

struct FailingProvisioner;

impl ArtifactProvisioner for FailingProvisioner {
    async fn ensure_artifact(&self, _id: ArtifactId) -> Result<PathBuf, EngineError> {
        Err(EngineError::provision("artifact unavailable"))
    }
}

fn test_coordinator(debounce_ms: u64) -> CompletionCoordinator<FailingProvisioner> {
    let config = EngineConfig {
        debounce_ms,
        ..EngineConfig::default()
    };
    let registry = Arc::new(EndpointRegistry::new(FailingProvisioner, config.clone()));
    CompletionCoordinator::new(registry, config)
}

fn context(id: &str) -> CompletionContext {
    CompletionContext {
        context_id: id.to_string(),
        document_name: "src/main.rs".to_string(),
        text_before: "fn main() {".to_string(),
        text_after: "}".to_string(),
        context_documents: Vec::new(),
        kind: ModelKind::BaseSmall,
        overrides: Map::new(),
    }
}

#[test]
fn busy_guard_restores_idle_on_drop() {
    let tracker = BusyTracker::new();
    assert!(!tracker.is_busy());

    let outer = tracker.acquire();
    let inner = tracker.acquire();
    assert!(tracker.is_busy());

    drop(inner);
    assert!(tracker.is_busy());
    drop(outer);
    assert!(!tracker.is_busy());
}

#[tokio::test]
async fn a_newer_request_supersedes_the_older_one() {
    let coordinator = Arc::new(test_coordinator(200));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.request_completion(context("doc-1")).await })
    };
    // Let the first request settle into its debounce wait.
    sleep(Duration::from_millis(30)).await;

    let second = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.request_completion(context("doc-1")).await })
    };

    // The superseded request resolves as a silent cancellation.
    let first_result = first.await.unwrap().unwrap();
    assert!(first_result.is_none());

    // The newer request runs to dispatch, where it fails because the
    // endpoint was never started. That failure is its own, not an
    // endpoint-level one.
    let second_result = second.await.unwrap();
    assert!(second_result.is_err());
}

#[tokio::test]
async fn cancel_active_stops_a_debouncing_request() {
    let coordinator = Arc::new(test_coordinator(200));

    let request = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.request_completion(context("doc-2")).await })
    };
    sleep(Duration::from_millis(30)).await;

    coordinator.cancel_active("doc-2");

    let result = request.await.unwrap().unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn requests_for_distinct_contexts_do_not_supersede_each_other() {
    let coordinator = Arc::new(test_coordinator(100));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.request_completion(context("doc-a")).await })
    };
    let second = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.request_completion(context("doc-b")).await })
    };

    // Neither was cancelled; both reach dispatch and fail on the
    // unstarted endpoint.
    assert!(first.await.unwrap().is_err());
    assert!(second.await.unwrap().is_err());
}

#[tokio::test]
async fn request_failures_do_not_touch_endpoint_status() {
    let config = EngineConfig {
        debounce_ms: 10,
        ..EngineConfig::default()
    };
    let registry = Arc::new(EndpointRegistry::new(FailingProvisioner, config.clone()));
    let coordinator = CompletionCoordinator::new(Arc::clone(&registry), config);

    let result = coordinator.request_completion(context("doc-3")).await;
    assert!(result.is_err());
    assert_eq!(registry.status(ModelKind::BaseSmall), EndpointStatus::Stopped);

    // The busy indicator is back to idle despite the failure.
    assert!(!coordinator.busy().is_busy());
}
