use std::fmt;
use thiserror::Error;

/// The three backend operations the workflow drives, plus the auxiliary reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Operation {
    FetchState,
    Analyze,
    Verify,
    Health,
    ListFrames,
    CurrentFrame,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::FetchState => "Fetch state",
            Operation::Analyze => "Analyze",
            Operation::Verify => "Verify",
            Operation::Health => "Health check",
            Operation::ListFrames => "List frames",
            Operation::CurrentFrame => "Current frame",
        };
        f.write_str(name)
    }
}

/// Backend failure. Every variant renders as the same generic
/// "<operation> failed" banner; the cause is kept for logs only.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("{op} failed")]
    Transport { op: Operation, reason: String },

    #[error("{op} failed")]
    Status { op: Operation, status: u16 },

    #[error("{op} failed")]
    Decode { op: Operation, reason: String },

    /// The backend implementation does not offer this operation.
    #[error("{op} failed")]
    Unsupported { op: Operation },
}

impl ClientError {
    pub fn operation(&self) -> Operation {
        match self {
            ClientError::Transport { op, .. }
            | ClientError::Status { op, .. }
            | ClientError::Decode { op, .. }
            | ClientError::Unsupported { op } => *op,
        }
    }

    /// Cause detail for tracing, never shown in the banner.
    pub fn detail(&self) -> String {
        match self {
            ClientError::Transport { reason, .. } => format!("transport: {}", reason),
            ClientError::Status { status, .. } => format!("status {}", status),
            ClientError::Decode { reason, .. } => format!("decode: {}", reason),
            ClientError::Unsupported { .. } => "not supported by this backend".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("base URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),
}
