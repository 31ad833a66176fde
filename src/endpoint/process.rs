use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::error::EngineError;
use crate::logging::log_subprocess_line;

/// A running server process as the supervisor sees it. The state machine
/// only ever kills, liveness-checks, and identifies the process; how it
/// was created stays behind [`ProcessSpawner`].
pub trait ProcessHandle: Send + 'static {
    fn kill(&mut self) -> impl Future<Output = ()> + Send;
    fn is_running(&mut self) -> bool;
    fn pid(&self) -> Option<u32>;
}

/// Turns a binary plus launch args into a [`ProcessHandle`]. The registry
/// is generic over this, so tests can count spawns or hand out fakes
/// without touching the host process API.
pub trait ProcessSpawner: Send + Sync + 'static {
    type Handle: ProcessHandle;

    fn spawn(
        &self,
        binary: &Path,
        args: &[String],
        label: &'static str,
    ) -> Result<Self::Handle, EngineError>;
}

/// Production spawner: real child processes via `tokio::process`.
pub struct CommandSpawner;

impl ProcessSpawner for CommandSpawner {
    type Handle = ManagedProcess;

    fn spawn(
        &self,
        binary: &Path,
        args: &[String],
        label: &'static str,
    ) -> Result<ManagedProcess, EngineError> {
        ManagedProcess::start(binary, args, label)
    }
}

/// Minimal wrapper around a spawned server process. Owns the child handle
/// and the tasks that drain its output streams.
pub struct ManagedProcess {
    child: Child,
    kind_label: &'static str,
}

impl ManagedProcess {
    /// Spawn the server with piped output. Both streams are drained line
    /// by line into the log facade; an undrained pipe would eventually
    /// block the server.
    pub fn start(
        binary: &Path,
        args: &[String],
        kind_label: &'static str,
    ) -> Result<Self, EngineError> {
        let mut child = Command::new(binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::spawn(&format!("{}: {}", binary.display(), e)))?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log_subprocess_line(kind_label, &line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log_subprocess_line(kind_label, &line);
                }
            });
        }

        Ok(Self { child, kind_label })
    }
}

impl ProcessHandle for ManagedProcess {
    /// Forceful kill. Killing an already-dead process is a no-op.
    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            log::debug!("[{}] kill: {}", self.kind_label, e);
        }
    }

    /// True while the child has not exited.
    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}
