use std::fmt;
use std::path::Path;
use std::time::Duration;

/// One logical model variant. Each kind owns a fixed port so endpoints
/// never collide and URLs stay stable across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    BaseSmall,
    BaseMedium,
    ChatSmall,
    ChatMedium,
    EmbedSmall,
}

impl ModelKind {
    pub const ALL: &'static [ModelKind] = &[
        ModelKind::BaseSmall,
        ModelKind::BaseMedium,
        ModelKind::ChatSmall,
        ModelKind::ChatMedium,
        ModelKind::EmbedSmall,
    ];

    pub fn port(&self) -> u16 {
        match self {
            ModelKind::BaseSmall => 39720,
            ModelKind::BaseMedium => 39721,
            ModelKind::ChatSmall => 39725,
            ModelKind::ChatMedium => 39726,
            ModelKind::EmbedSmall => 39730,
        }
    }

    pub fn context_size(&self) -> u32 {
        match self {
            ModelKind::EmbedSmall => 2048,
            _ => 4096,
        }
    }

    pub fn parallel_slots(&self) -> u32 {
        4
    }

    /// Larger models take longer to load into memory before the first
    /// health probe can succeed.
    pub fn startup_timeout(&self) -> Duration {
        match self {
            ModelKind::BaseSmall | ModelKind::EmbedSmall => Duration::from_secs(5),
            ModelKind::ChatSmall => Duration::from_secs(10),
            ModelKind::BaseMedium | ModelKind::ChatMedium => Duration::from_secs(20),
        }
    }

    /// Embedding models are small enough that offload is not worth the
    /// VRAM; generation models want it whenever the host allows.
    pub fn prefers_gpu(&self) -> bool {
        !matches!(self, ModelKind::EmbedSmall)
    }

    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port())
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::BaseSmall => "base-small",
            ModelKind::BaseMedium => "base-medium",
            ModelKind::ChatSmall => "chat-small",
            ModelKind::ChatMedium => "chat-medium",
            ModelKind::EmbedSmall => "embed-small",
        }
    }

    pub fn parse(label: &str) -> Option<ModelKind> {
        ModelKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.label() == label)
    }

    /// Launch arguments for the server process. Deterministic for a given
    /// kind + gpu decision, so restarts always reproduce the same server.
    pub fn launch_args(&self, model_path: &Path, gpu_offload: bool) -> Vec<String> {
        let mut args = vec![
            "--model".to_string(),
            model_path.display().to_string(),
            "--port".to_string(),
            self.port().to_string(),
            "--parallel".to_string(),
            self.parallel_slots().to_string(),
            "--ctx-size".to_string(),
            self.context_size().to_string(),
            "--cont-batching".to_string(),
            "--embedding".to_string(),
            "--log-disable".to_string(),
        ];
        if gpu_offload && self.prefers_gpu() {
            args.push("--n-gpu-layers".to_string());
            args.push("99".to_string());
        }
        args
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
