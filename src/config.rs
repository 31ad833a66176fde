use std::path::PathBuf;

use clap::Parser;

use crate::constants::{
    DEBOUNCE_DELAY_MS, HEALTH_POLL_INTERVAL_MS, MAX_PROMPT_TOKEN_HARD_LIMIT,
    STARTUP_PROBE_INTERVAL_MS,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "llamacpp-engine")]
#[command(about = "local llama.cpp completion engine: supervises servers and streams completions")]
pub struct Config {
    #[arg(long, help = "path to the llama.cpp server binary")]
    pub server_bin: PathBuf,

    #[arg(long, help = "path to the gguf model file served by each endpoint")]
    pub model_path: PathBuf,

    #[arg(
        long,
        default_value = "base-small",
        help = "model variant to start (base-small, base-medium, chat-small, chat-medium, embed-small)"
    )]
    pub model: String,

    #[arg(
        long,
        default_value = "info",
        help = "log level (off, error, warn, info, debug, trace)"
    )]
    pub log_level: String,

    #[arg(long, help = "offload model layers to the gpu")]
    pub use_gpu: bool,

    #[arg(
        long,
        default_value_t = DEBOUNCE_DELAY_MS,
        help = "debounce delay before dispatching a completion (ms)"
    )]
    pub debounce_ms: u64,

    #[arg(
        long,
        default_value_t = 200,
        help = "token budget for fitted prompts"
    )]
    pub max_prompt_tokens: usize,

    #[arg(
        long,
        default_value_t = STARTUP_PROBE_INTERVAL_MS,
        help = "health probe interval while waiting for server startup (ms)"
    )]
    pub startup_probe_interval_ms: u64,

    #[arg(
        long,
        default_value_t = HEALTH_POLL_INTERVAL_MS,
        help = "background health poll interval once started (ms)"
    )]
    pub health_poll_interval_ms: u64,
}

/// Settings the engine needs at runtime, decoupled from CLI parsing so
/// embedders can construct them directly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub use_gpu: bool,
    pub debounce_ms: u64,
    pub max_prompt_tokens: usize,
    pub startup_probe_interval_ms: u64,
    pub health_poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_gpu: false,
            debounce_ms: DEBOUNCE_DELAY_MS,
            max_prompt_tokens: 200,
            startup_probe_interval_ms: STARTUP_PROBE_INTERVAL_MS,
            health_poll_interval_ms: HEALTH_POLL_INTERVAL_MS,
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            use_gpu: config.use_gpu,
            debounce_ms: config.debounce_ms,
            max_prompt_tokens: config.max_prompt_tokens.min(MAX_PROMPT_TOKEN_HARD_LIMIT),
            startup_probe_interval_ms: config.startup_probe_interval_ms,
            health_poll_interval_ms: config.health_poll_interval_ms,
        }
    }
}

pub fn validate_config(config: &Config) -> Result<(), String> {
    if !config.server_bin.is_file() {
        return Err(format!(
            "server binary not found: {}",
            config.server_bin.display()
        ));
    }
    if !config.model_path.is_file() {
        return Err(format!(
            "model file not found: {}",
            config.model_path.display()
        ));
    }
    if config.max_prompt_tokens == 0 {
        return Err("max-prompt-tokens must be greater than zero".to_string());
    }
    if config.max_prompt_tokens > MAX_PROMPT_TOKEN_HARD_LIMIT {
        log::warn!(
            "max-prompt-tokens {} exceeds hard limit, clamping to {}",
            config.max_prompt_tokens,
            MAX_PROMPT_TOKEN_HARD_LIMIT
        );
    }
    Ok(())
}
