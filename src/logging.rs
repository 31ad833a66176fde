use std::time::{Duration, Instant};

use crate::constants::SUBPROCESS_LOG_NOISE;

/// Component-tagged info line, e.g. `[completion:ab12cd34] Request: started`.
pub fn log_component(component: &str, message: &str) {
    log::info!("[{}] {}", component, sanitize_log_message(message));
}

pub fn log_component_error(component: &str, message: &str) {
    log::error!("[{}] {}", component, sanitize_log_message(message));
}

pub fn log_timed(component: &str, operation: &str, start: Instant) {
    log::info!(
        "[{}] {} | {}",
        component,
        operation,
        format_duration(start.elapsed())
    );
}

pub fn format_duration(duration: Duration) -> String {
    let total_nanos = duration.as_nanos();

    if total_nanos < 1_000_000 {
        format!("{:.1}µs", total_nanos as f64 / 1_000.0)
    } else if total_nanos < 1_000_000_000 {
        format!("{:.2}ms", total_nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", total_nanos as f64 / 1_000_000_000.0)
    }
}

pub fn sanitize_log_message(message: &str) -> String {
    message
        .chars()
        .map(|c| {
            if c.is_control() && !matches!(c, '\t' | '\n' | '\r') {
                '?'
            } else {
                c
            }
        })
        .collect()
}

/// The spawned server writes one access-log line per health probe and
/// tokenize call; with 500 ms polling that drowns everything else.
pub fn is_subprocess_noise(line: &str) -> bool {
    SUBPROCESS_LOG_NOISE
        .iter()
        .any(|needle| line.contains(needle))
}

/// Forward one subprocess output line through the log facade.
pub fn log_subprocess_line(kind_label: &str, line: &str) {
    if line.trim().is_empty() || is_subprocess_noise(line) {
        return;
    }
    log::trace!("[llama:{}] {}", kind_label, sanitize_log_message(line));
}
