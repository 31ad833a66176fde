use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use crate::endpoint::kind::ModelKind;
use crate::error::EngineError;

/// Logical identifier for a file artifact the supervisor needs on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    ServerBinary,
    Model(ModelKind),
}

/// Resolves a logical artifact to a verified local path. Implementations
/// must be idempotent; the download/checksum machinery behind them is not
/// the engine's concern.
pub trait ArtifactProvisioner: Send + Sync + 'static {
    fn ensure_artifact(
        &self,
        id: ArtifactId,
    ) -> impl Future<Output = Result<PathBuf, EngineError>> + Send;
}

/// Provisioner backed by preconfigured paths. Verifies the file exists
/// and is non-empty on every call.
#[derive(Debug, Clone)]
pub struct DiskProvisioner {
    server_bin: PathBuf,
    models: HashMap<ModelKind, PathBuf>,
}

impl DiskProvisioner {
    pub fn new(server_bin: PathBuf, models: HashMap<ModelKind, PathBuf>) -> Self {
        Self { server_bin, models }
    }

    /// Single-model convenience: every kind resolves to the same file.
    pub fn single_model(server_bin: PathBuf, model: PathBuf) -> Self {
        let models = ModelKind::ALL
            .iter()
            .map(|kind| (*kind, model.clone()))
            .collect();
        Self { server_bin, models }
    }

    fn verify(path: &PathBuf) -> Result<PathBuf, EngineError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| EngineError::provision(&format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(EngineError::provision(&format!(
                "artifact missing or empty: {}",
                path.display()
            )));
        }
        Ok(path.clone())
    }
}

impl ArtifactProvisioner for DiskProvisioner {
    async fn ensure_artifact(&self, id: ArtifactId) -> Result<PathBuf, EngineError> {
        match id {
            ArtifactId::ServerBinary => Self::verify(&self.server_bin),
            ArtifactId::Model(kind) => {
                let path = self.models.get(&kind).ok_or_else(|| {
                    EngineError::provision(&format!("no model configured for {}", kind))
                })?;
                Self::verify(path)
            }
        }
    }
}
