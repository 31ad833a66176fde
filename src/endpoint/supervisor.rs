use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::constants::{ERROR_HEALTH_TIMEOUT, ERROR_UNRESPONSIVE, ROUTE_HEALTH};
use crate::endpoint::kind::ModelKind;
use crate::endpoint::process::{CommandSpawner, ProcessHandle, ProcessSpawner};
use crate::error::EngineError;
use crate::logging::{log_component, log_component_error, log_timed};
use crate::provision::{ArtifactId, ArtifactProvisioner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Stopped,
    Provisioning,
    Spawning,
    AwaitingHealth,
    Started,
    Unresponsive,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// One supervised server. The async mutex around the process slot is the
/// single-flight guard: concurrent `start` calls for the same kind
/// serialize on it, so at most one process is ever spawned per endpoint.
pub struct Endpoint<H> {
    kind: ModelKind,
    state: tokio::sync::Mutex<EndpointState<H>>,
    status_tx: watch::Sender<EndpointStatus>,
    last_health_check: Mutex<Option<Instant>>,
}

struct EndpointState<H> {
    process: Option<H>,
    health_cancel: Option<CancellationToken>,
}

impl<H> Default for EndpointState<H> {
    fn default() -> Self {
        Self {
            process: None,
            health_cancel: None,
        }
    }
}

impl<H: ProcessHandle> Endpoint<H> {
    fn new(kind: ModelKind) -> Self {
        let (status_tx, _) = watch::channel(EndpointStatus::Stopped);
        Self {
            kind,
            state: tokio::sync::Mutex::new(EndpointState::default()),
            status_tx,
            last_health_check: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn status(&self) -> EndpointStatus {
        *self.status_tx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<EndpointStatus> {
        self.status_tx.subscribe()
    }

    pub fn last_health_check(&self) -> Option<Instant> {
        *self.last_health_check.lock().expect("health check lock")
    }

    fn set_status(&self, status: EndpointStatus) {
        self.status_tx.send_replace(status);
    }

    fn record_health_check(&self) {
        *self.last_health_check.lock().expect("health check lock") = Some(Instant::now());
    }
}

/// Registry of all endpoints, one per model kind. Built once at startup
/// and injected wherever endpoints are needed; there is no global
/// instance.
pub struct EndpointRegistry<P, S: ProcessSpawner = CommandSpawner> {
    endpoints: HashMap<ModelKind, Arc<Endpoint<S::Handle>>>,
    provisioner: P,
    spawner: S,
    client: reqwest::Client,
    config: EngineConfig,
}

impl<P: ArtifactProvisioner> EndpointRegistry<P> {
    pub fn new(provisioner: P, config: EngineConfig) -> Self {
        Self::with_spawner(provisioner, CommandSpawner, config)
    }
}

impl<P: ArtifactProvisioner, S: ProcessSpawner> EndpointRegistry<P, S> {
    pub fn with_spawner(provisioner: P, spawner: S, config: EngineConfig) -> Self {
        let endpoints = ModelKind::ALL
            .iter()
            .map(|kind| (*kind, Arc::new(Endpoint::new(*kind))))
            .collect();
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoints,
            provisioner,
            spawner,
            client,
            config,
        }
    }

    /// Shared HTTP client; reused for completions and tokenize calls so
    /// everything rides the same connection pool.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn endpoint(&self, kind: ModelKind) -> &Arc<Endpoint<S::Handle>> {
        self.endpoints
            .get(&kind)
            .expect("registry holds every model kind")
    }

    pub fn status(&self, kind: ModelKind) -> EndpointStatus {
        self.endpoint(kind).status()
    }

    /// Base URL for a started endpoint. Callers that need the server
    /// running should `start` first.
    pub fn base_url(&self, kind: ModelKind) -> Result<String, EngineError> {
        match self.status(kind) {
            EndpointStatus::Started => Ok(kind.base_url()),
            EndpointStatus::Unresponsive => Err(EngineError::endpoint_unresponsive(&format!(
                "{}: {}",
                kind, ERROR_UNRESPONSIVE
            ))),
            status => Err(EngineError::network(&format!(
                "endpoint {} not started (status {:?})",
                kind, status
            ))),
        }
    }

    /// Start the server for `kind`. Idempotent: a started endpoint that
    /// still answers its health route is left alone. Failures leave the
    /// endpoint Stopped and are never retried here; recovery is an
    /// explicit caller decision.
    pub async fn start(&self, kind: ModelKind) -> Result<(), EngineError> {
        let endpoint = Arc::clone(self.endpoint(kind));
        let mut state = endpoint.state.lock().await;

        let process_alive = state
            .process
            .as_mut()
            .is_some_and(|process| process.is_running());
        if endpoint.status() == EndpointStatus::Started
            && process_alive
            && probe_health(&self.client, &kind.base_url()).await
        {
            endpoint.record_health_check();
            log_component("server", &format!("{} already started", kind));
            return Ok(());
        }

        // A stale process from a previous life (e.g. Unresponsive) must
        // die before a new one binds the port.
        if let Some(mut process) = state.process.take() {
            process.kill().await;
        }
        if let Some(cancel) = state.health_cancel.take() {
            cancel.cancel();
        }

        let start_time = Instant::now();
        endpoint.set_status(EndpointStatus::Provisioning);

        let binary = match self.provisioner.ensure_artifact(ArtifactId::ServerBinary).await {
            Ok(path) => path,
            Err(e) => {
                endpoint.set_status(EndpointStatus::Stopped);
                log_component_error("server", &format!("{}: {}", kind, e));
                return Err(e);
            }
        };
        let model = match self.provisioner.ensure_artifact(ArtifactId::Model(kind)).await {
            Ok(path) => path,
            Err(e) => {
                endpoint.set_status(EndpointStatus::Stopped);
                log_component_error("server", &format!("{}: {}", kind, e));
                return Err(e);
            }
        };

        endpoint.set_status(EndpointStatus::Spawning);
        let args = kind.launch_args(&model, self.config.use_gpu);
        let process = match self.spawner.spawn(&binary, &args, kind.label()) {
            Ok(process) => process,
            Err(e) => {
                endpoint.set_status(EndpointStatus::Stopped);
                log_component_error("server", &format!("{}: {}", kind, e));
                return Err(e);
            }
        };
        log_component(
            "server",
            &format!("{} spawned (pid {:?})", kind, process.pid()),
        );
        state.process = Some(process);

        endpoint.set_status(EndpointStatus::AwaitingHealth);
        let became_healthy = self
            .await_first_health(kind, kind.startup_timeout())
            .await;

        if !became_healthy {
            if let Some(mut process) = state.process.take() {
                process.kill().await;
            }
            endpoint.set_status(EndpointStatus::Stopped);
            let message = format!("{}: {}", kind, ERROR_HEALTH_TIMEOUT);
            log_component_error("server", &message);
            return Err(EngineError::health_timeout(&message));
        }

        endpoint.record_health_check();
        endpoint.set_status(EndpointStatus::Started);
        log_timed("server", &format!("{} started", kind), start_time);

        let cancel = CancellationToken::new();
        state.health_cancel = Some(cancel.clone());
        self.spawn_health_loop(Arc::clone(&endpoint), cancel);

        Ok(())
    }

    /// Kill the server for `kind`. Stopping a stopped endpoint is a no-op.
    pub async fn stop(&self, kind: ModelKind) {
        let endpoint = self.endpoint(kind);
        let mut state = endpoint.state.lock().await;
        if let Some(cancel) = state.health_cancel.take() {
            cancel.cancel();
        }
        if let Some(mut process) = state.process.take() {
            process.kill().await;
            log_component("server", &format!("{} stopped", kind));
        }
        endpoint.set_status(EndpointStatus::Stopped);
    }

    pub async fn stop_all(&self) {
        for kind in ModelKind::ALL {
            self.stop(*kind).await;
        }
    }

    /// Fast polling until the freshly spawned server answers its health
    /// route, bounded by the kind's startup timeout.
    async fn await_first_health(&self, kind: ModelKind, timeout: Duration) -> bool {
        let base_url = kind.base_url();
        let interval = Duration::from_millis(self.config.startup_probe_interval_ms);
        let deadline = Instant::now() + timeout;

        loop {
            if probe_health(&self.client, &base_url).await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(interval).await;
        }
    }

    /// Slow background poll after startup. One failed probe marks the
    /// endpoint Unresponsive and ends the loop; there is no automatic
    /// restart, so a crash-looping server cannot turn into a restart
    /// storm. Recovery happens when a caller explicitly starts again.
    fn spawn_health_loop(&self, endpoint: Arc<Endpoint<S::Handle>>, cancel: CancellationToken) {
        let client = self.client.clone();
        let interval = Duration::from_millis(self.config.health_poll_interval_ms);
        let base_url = endpoint.kind().base_url();
        let kind = endpoint.kind();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep(interval) => {}
                }
                if probe_health(&client, &base_url).await {
                    endpoint.record_health_check();
                } else {
                    endpoint.set_status(EndpointStatus::Unresponsive);
                    log_component_error(
                        "server",
                        &format!("{}: {}", kind, ERROR_UNRESPONSIVE),
                    );
                    return;
                }
            }
        });
    }
}

/// One health probe: `GET /health` must answer 2xx with `{"status":"ok"}`.
async fn probe_health(client: &reqwest::Client, base_url: &str) -> bool {
    let url = format!("{}{}", base_url, ROUTE_HEALTH);
    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => {
            match response.json::<HealthResponse>().await {
                Ok(health) => health.status == "ok",
                Err(_) => false,
            }
        }
        _ => false,
    }
}
