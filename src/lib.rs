//! Client-side orchestration for locally spawned llama.cpp-style
//! completion servers.
//!
//! The engine supervises one server process per model variant, fits
//! prompts to an adaptively measured token budget against the server's
//! own tokenizer, and streams completion deltas back with mid-flight
//! cancellation. Editors integrate through [`CompletionCoordinator`],
//! which debounces edits and guarantees only the newest request per
//! context is ever surfaced.

pub mod completion;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod logging;
pub mod prompt;
pub mod provision;

#[cfg(test)]
mod tests;

pub use completion::{CompletionRequest, GenerationDelta, SamplingParams};
pub use config::{Config, EngineConfig};
pub use coordinator::{CompletionContext, CompletionCoordinator};
pub use endpoint::{EndpointRegistry, EndpointStatus, ModelKind};
pub use error::EngineError;
pub use provision::{ArtifactId, ArtifactProvisioner, DiskProvisioner};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
