use thiserror::Error;

/// Main error type for the batch coordinator
#[derive(Error, Debug)]
pub enum SealError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Settlement backend errors
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    // Coordination errors
    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SealError
pub type Result<T> = std::result::Result<T, SealError>;

/// Whether a failed settlement call is worth repeating with the same inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// The backend rejected the inputs; resubmitting fails identically.
    Permanent,
    /// Transport, timeout or transaction-race failure.
    Transient,
}

/// Tagged errors returned by every settlement client call.
///
/// The first block mirrors the settlement contract's known rejection reasons.
/// Anything the backend reports with a code outside that set lands in
/// [`SettlementError::Rpc`] and is treated as transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("invalid commitment: {0}")]
    InvalidCommitment(String),

    #[error("insufficient commitments: {0}")]
    InsufficientCommitments(String),

    #[error("batch conditions not met: {0}")]
    BatchConditionsNotMet(String),

    #[error("deadline expired: {0}")]
    DeadlineExpired(String),

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("commitment already revealed: {0}")]
    AlreadyRevealed(String),

    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    #[error("fee too low: {0}")]
    FeeTooLow(String),

    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: String, message: String },
}

impl SettlementError {
    /// Map a backend rejection code to its variant.
    ///
    /// Codes are matched case-insensitively with `-`/` ` treated as `_`, so
    /// `InsufficientCommitments`, `insufficient-commitments` and
    /// `INSUFFICIENT_COMMITMENTS` all resolve to the same variant.
    pub fn from_reason(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let normalized: String = code
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "invalidcommitment" => Self::InvalidCommitment(message),
            "insufficientcommitments" => Self::InsufficientCommitments(message),
            "batchconditionsnotmet" => Self::BatchConditionsNotMet(message),
            "deadlineexpired" => Self::DeadlineExpired(message),
            "invalidproof" => Self::InvalidProof(message),
            "alreadyrevealed" | "commitmentalreadyrevealed" => Self::AlreadyRevealed(message),
            "nonceconflict" | "noncetoolow" | "replacementunderpriced" => {
                Self::NonceConflict(message)
            }
            "feetoolow" | "underpriced" => Self::FeeTooLow(message),
            "timeout" => Self::Timeout { elapsed_ms: 0 },
            _ => Self::Rpc {
                code: code.to_string(),
                message,
            },
        }
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::InvalidCommitment(_)
            | Self::InsufficientCommitments(_)
            | Self::BatchConditionsNotMet(_)
            | Self::DeadlineExpired(_)
            | Self::InvalidProof(_)
            | Self::AlreadyRevealed(_) => RetryClass::Permanent,
            Self::NonceConflict(_)
            | Self::FeeTooLow(_)
            | Self::Timeout { .. }
            | Self::Transport(_)
            | Self::Rpc { .. } => RetryClass::Transient,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.retry_class() == RetryClass::Permanent
    }
}
