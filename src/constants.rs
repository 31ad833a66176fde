/// llama.cpp server HTTP routes
pub const ROUTE_COMPLETION: &str = "/completion";
pub const ROUTE_HEALTH: &str = "/health";
pub const ROUTE_TOKENIZE: &str = "/tokenize";

/// Fill-in-middle markers understood by the completion models
pub const FIM_BEGIN: &str = "<｜fim▁begin｜>";
pub const FIM_HOLE: &str = "<｜fim▁hole｜>";
pub const FIM_END: &str = "<｜fim▁end｜>";

/// Stream framing
pub const FRAME_FIELD_DATA: &str = "data";
pub const FRAME_FIELD_ERROR: &str = "error";
pub const SLOT_UNAVAILABLE_NEEDLE: &str = "slot unavailable";

/// Timing constants
pub const DEBOUNCE_DELAY_MS: u64 = 250;
pub const STARTUP_PROBE_INTERVAL_MS: u64 = 200;
pub const HEALTH_POLL_INTERVAL_MS: u64 = 500;
pub const STREAM_TIMEOUT_SECONDS: u64 = 600;

/// Budget fitting constants
pub const MAX_FIT_ITERATIONS: u32 = 32;
pub const FIT_STEP_PADDING_CHARS: usize = 5;
pub const MIN_TOLERANCE_TOKENS: usize = 10;
pub const AUX_DOCUMENT_BUDGET_FLOOR: usize = 100;
pub const MAX_PROMPT_TOKEN_HARD_LIMIT: usize = 4000;

/// Error messages
pub const ERROR_CANCELLED: &str = "Request cancelled by caller";
pub const ERROR_SLOT_UNAVAILABLE: &str = "Server has no free generation slot";
pub const ERROR_SERVER_UNAVAILABLE: &str = "Inference server not reachable";
pub const ERROR_HEALTH_TIMEOUT: &str = "Server did not become healthy in time";
pub const ERROR_UNRESPONSIVE: &str = "Server stopped responding to health checks";

/// Subprocess log lines dropped before forwarding to the log sink.
/// The server emits one access-log line per health probe and tokenize
/// call, plus one line per sampled token at higher verbosity.
pub const SUBPROCESS_LOG_NOISE: &[&str] = &[
    "\"path\":\"/health\"",
    "\"path\":\"/tokenize\"",
    "sampled token:",
];

/// Initial capacity for the per-stream accumulation buffer (bytes)
pub const STREAM_BUFFER_CAPACITY_HINT: usize = 64 * 1024;
