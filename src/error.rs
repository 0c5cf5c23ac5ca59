//! Error types for the Driftwatch analysis pipeline.
//!
//! This module provides a comprehensive error hierarchy for all operations
//! in the drift-analysis lifecycle: message intake, collaborator reads,
//! persistence, classification, and orchestration.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Driftwatch analysis pipeline.
#[derive(Debug, Error)]
pub enum DriftwatchError {
    /// Queue message shape errors.
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    /// IaC definition source errors.
    #[error("Definition source error: {0}")]
    Source(#[from] SourceError),

    /// Live Azure resource reader errors.
    #[error("Azure reader error: {0}")]
    Azure(#[from] AzureError),

    /// Scan/finding repository errors.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Analysis orchestration errors.
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// Queue transport errors.
    #[error("Queue transport error: {0}")]
    Transport(#[from] TransportError),

    /// Classifier rule table errors.
    #[error("Rule table error: {0}")]
    Rules(#[from] RulesError),

    /// Worker settings errors.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Queue message shape errors.
///
/// These always mark the message as malformed: the consumer dead-letters
/// it immediately instead of retrying.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The payload was not valid JSON.
    #[error("Message payload is not valid JSON: {message}")]
    InvalidJson {
        /// Description of the parse error.
        message: String,
    },

    /// A required field is missing or empty.
    #[error("Message is missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },
}

/// IaC definition source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No expected-resource definitions exist for the pipeline.
    #[error("No definitions found for pipeline: {pipeline_id}")]
    DefinitionsNotFound {
        /// Pipeline whose definitions are missing.
        pipeline_id: String,
    },

    /// The definition source is temporarily unreachable.
    #[error("Definition source unavailable: {message}")]
    Unavailable {
        /// Description of the outage.
        message: String,
    },

    /// A definition record could not be decoded.
    #[error("Malformed definition for pipeline {pipeline_id}: {message}")]
    MalformedDefinition {
        /// Pipeline the definition belongs to.
        pipeline_id: String,
        /// Description of the decode failure.
        message: String,
    },
}

/// Live Azure resource reader errors.
#[derive(Debug, Error)]
pub enum AzureError {
    /// Authentication against Azure failed.
    #[error("Azure authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// Azure Resource Manager throttled the request.
    #[error("Azure request throttled, retry after {retry_after_secs} seconds")]
    Throttled {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error reaching Azure.
    #[error("Network error communicating with Azure: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// The reader returned a response the core cannot interpret.
    #[error("Invalid response from Azure reader: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Scan/finding repository errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Optimistic-concurrency check failed.
    #[error("Concurrent update conflict on {entity}: expected etag {expected}, found {found}")]
    Conflict {
        /// Entity that was concurrently updated.
        entity: String,
        /// Etag the caller expected.
        expected: String,
        /// Etag actually stored.
        found: String,
    },

    /// The requested record does not exist.
    #[error("Record not found: {key}")]
    RecordNotFound {
        /// Key of the missing record.
        key: String,
    },

    /// An update would re-open a scan that already reached a terminal state.
    #[error("Scan {scan_id} is already terminal ({status}); terminal states are immutable")]
    TerminalStateImmutable {
        /// Scan whose state is terminal.
        scan_id: String,
        /// The terminal status it holds.
        status: String,
    },

    /// The backing store is temporarily unavailable.
    #[error("Repository unavailable: {message}")]
    Unavailable {
        /// Description of the outage.
        message: String,
    },

    /// A record could not be serialized or deserialized.
    #[error("Repository serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Analysis orchestration errors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The requested pipeline does not exist for the tenant.
    #[error("Pipeline {pipeline_id} not found for tenant {tenant_id}")]
    PipelineNotFound {
        /// Pipeline that was requested.
        pipeline_id: String,
        /// Tenant that owns the request.
        tenant_id: String,
    },

    /// The analysis was cancelled before completion.
    #[error("Analysis {correlation_id} was cancelled")]
    Cancelled {
        /// Correlation ID of the cancelled analysis.
        correlation_id: String,
    },

    /// A retryable stage exhausted its attempt budget.
    ///
    /// Still transient at the queue level: the in-process budget is
    /// spent, but a later redelivery may succeed.
    #[error("Stage {stage} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        /// Stage that kept failing.
        stage: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last error observed.
        message: String,
    },
}

/// Queue transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A settlement call raced a lapsed or stolen lease.
    ///
    /// The message is already redeliverable elsewhere; the caller logs
    /// and moves on instead of retrying.
    #[error("Delivery lease lost for message {message_id}")]
    LeaseLost {
        /// Message whose lease lapsed.
        message_id: String,
    },

    /// The queue backend is temporarily unreachable.
    #[error("Queue unavailable: {message}")]
    Unavailable {
        /// Description of the outage.
        message: String,
    },
}

/// Classifier rule table errors.
///
/// The rule table is a startup invariant: a worker without one would
/// silently under-classify drift, so these are fatal.
#[derive(Debug, Error)]
pub enum RulesError {
    /// The rule file was not found.
    #[error("Rule table file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The rule table could not be parsed.
    #[error("Failed to parse rule table: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },

    /// The rule table is structurally invalid.
    #[error("Invalid rule table: {message}")]
    InvalidTable {
        /// Description of the problem.
        message: String,
    },
}

/// Worker settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Environment variable has an invalid value.
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Coarse error taxonomy driving consumer and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad message shape: dead-letter immediately, never retry.
    Malformed,
    /// Timeout, throttle, or lock conflict: retry with backoff.
    Transient,
    /// Missing pipeline/tenant/record: terminal for the unit, not retried.
    NotFound,
    /// Contract violation: propagate and crash the worker.
    Fatal,
    /// Non-retryable operational failure (for example auth rejection).
    Terminal,
}

/// Result type alias for Driftwatch operations.
pub type Result<T> = std::result::Result<T, DriftwatchError>;

impl DriftwatchError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classifies this error into the consumer taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Message(_) => ErrorKind::Malformed,
            Self::Source(SourceError::Unavailable { .. })
            | Self::Azure(AzureError::Throttled { .. } | AzureError::NetworkError { .. })
            | Self::Repository(
                RepositoryError::Conflict { .. } | RepositoryError::Unavailable { .. },
            )
            | Self::Transport(TransportError::Unavailable { .. })
            | Self::Analysis(AnalysisError::RetriesExhausted { .. }) => ErrorKind::Transient,
            Self::Source(SourceError::DefinitionsNotFound { .. })
            | Self::Repository(RepositoryError::RecordNotFound { .. })
            | Self::Analysis(AnalysisError::PipelineNotFound { .. }) => ErrorKind::NotFound,
            Self::Rules(_) | Self::Internal(_) => ErrorKind::Fatal,
            _ => ErrorKind::Terminal,
        }
    }

    /// Returns true if this error is retryable with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Azure(AzureError::Throttled { retry_after_secs }) => Some(*retry_after_secs),
            Self::Azure(AzureError::NetworkError { .. })
            | Self::Source(SourceError::Unavailable { .. }) => Some(5),
            Self::Repository(
                RepositoryError::Conflict { .. } | RepositoryError::Unavailable { .. },
            ) => Some(2),
            _ => None,
        }
    }
}

impl MessageError {
    /// Creates an invalid-JSON error from a serde failure.
    #[must_use]
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }

    /// Creates a missing-field error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl SourceError {
    /// Creates an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

impl AzureError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an authentication failure.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }
}

impl TransportError {
    /// Creates an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
