use std::error::Error;
use std::fmt;

use crate::constants::{ERROR_CANCELLED, ERROR_SLOT_UNAVAILABLE};

/// Error type for the completion engine
#[derive(Debug, Clone)]
pub struct EngineError {
    pub message: String,
    kind: EngineErrorKind,
}

#[derive(Debug, Clone)]
enum EngineErrorKind {
    Provision,
    Spawn,
    HealthTimeout,
    EndpointUnresponsive,
    Network,
    StreamProtocol,
    SlotUnavailable,
    RequestCancelled,
}

impl EngineError {
    pub fn provision(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: EngineErrorKind::Provision,
        }
    }

    pub fn spawn(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: EngineErrorKind::Spawn,
        }
    }

    pub fn health_timeout(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: EngineErrorKind::HealthTimeout,
        }
    }

    pub fn endpoint_unresponsive(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: EngineErrorKind::EndpointUnresponsive,
        }
    }

    pub fn network(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: EngineErrorKind::Network,
        }
    }

    pub fn stream_protocol(message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind: EngineErrorKind::StreamProtocol,
        }
    }

    pub fn slot_unavailable() -> Self {
        Self {
            message: ERROR_SLOT_UNAVAILABLE.to_string(),
            kind: EngineErrorKind::SlotUnavailable,
        }
    }

    pub fn request_cancelled() -> Self {
        Self {
            message: ERROR_CANCELLED.to_string(),
            kind: EngineErrorKind::RequestCancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, EngineErrorKind::RequestCancelled)
    }

    /// Slot exhaustion is retryable against another slot; every other
    /// stream error is not.
    pub fn is_slot_unavailable(&self) -> bool {
        matches!(self.kind, EngineErrorKind::SlotUnavailable)
    }

    pub fn is_stream_protocol(&self) -> bool {
        matches!(
            self.kind,
            EngineErrorKind::StreamProtocol | EngineErrorKind::SlotUnavailable
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(self.kind, EngineErrorKind::Network)
    }

    pub fn is_health_timeout(&self) -> bool {
        matches!(self.kind, EngineErrorKind::HealthTimeout)
    }

    pub fn is_provision(&self) -> bool {
        matches!(self.kind, EngineErrorKind::Provision)
    }

    pub fn is_spawn(&self) -> bool {
        matches!(self.kind, EngineErrorKind::Spawn)
    }

    pub fn is_endpoint_unresponsive(&self) -> bool {
        matches!(self.kind, EngineErrorKind::EndpointUnresponsive)
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            EngineErrorKind::Provision => "provision",
            EngineErrorKind::Spawn => "spawn",
            EngineErrorKind::HealthTimeout => "health-timeout",
            EngineErrorKind::EndpointUnresponsive => "unresponsive",
            EngineErrorKind::Network => "network",
            EngineErrorKind::StreamProtocol => "stream-protocol",
            EngineErrorKind::SlotUnavailable => "slot-unavailable",
            EngineErrorKind::RequestCancelled => "cancelled",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineError ({}): {}", self.kind_name(), self.message)
    }
}

impl Error for EngineError {}

#[macro_export]
macro_rules! check_cancelled {
    ($token:expr) => {
        if $token.is_cancelled() {
            return Err($crate::error::EngineError::request_cancelled());
        }
    };
}
