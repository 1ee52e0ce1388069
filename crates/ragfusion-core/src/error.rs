//! Error types for ragfusion.

use thiserror::Error;

/// Result type alias using FusionError.
pub type Result<T> = std::result::Result<T, FusionError>;

/// Errors that can occur while retrieving and fusing results.
#[derive(Error, Debug)]
pub enum FusionError {
    /// A remote provider call (embedding, completion, vector index) failed.
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    /// A remote call did not finish within its timeout.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// One or more query variants failed during a fan-out search.
    #[error(
        "{} of {total} query variants failed: {}",
        .failures.len(),
        summarize_failures(.failures)
    )]
    FanOut {
        failures: Vec<VariantFailure>,
        total: usize,
    },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// A single failed query variant inside a fan-out search.
#[derive(Debug)]
pub struct VariantFailure {
    /// The query text of the variant.
    pub query: String,

    /// Why the variant failed.
    pub error: FusionError,
}

impl std::fmt::Display for VariantFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self.query, self.error)
    }
}

fn summarize_failures(failures: &[VariantFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl FusionError {
    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get a stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "PROVIDER_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::FanOut { .. } => "FAN_OUT_FAILED",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether this error should stop the process before any work is done.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
