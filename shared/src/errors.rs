//! Error taxonomy and the bit-exact JSON error envelope.
//!
//! Grounded on `app/middleware/error_handler.py::ErrorResponse.create`
//! (original_source) for the envelope shape, and on spec.md §7 for the
//! taxonomy of error type strings.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ValidationError,
    HttpError,
    InternalError,
    ManualInterventionRequired,
    BackpressureExceeded,
    NameConflict,
    NoAgentAvailable,
    DependencyDeadlock,
}

impl ErrorType {
    pub fn default_http_code(self) -> u16 {
        match self {
            ErrorType::ValidationError => 400,
            ErrorType::NameConflict => 409,
            ErrorType::NoAgentAvailable => 422,
            ErrorType::DependencyDeadlock => 422,
            ErrorType::BackpressureExceeded => 429,
            ErrorType::ManualInterventionRequired => 202,
            ErrorType::HttpError => 400,
            ErrorType::InternalError => 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub message: String,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The bit-exact error envelope returned across the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(
        error_type: ErrorType,
        message: impl Into<String>,
        request_id: Option<String>,
        details: Option<Value>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: error_type.default_http_code(),
                error_type,
                message: message.into(),
                timestamp: Utc::now().timestamp() as f64
                    + Utc::now().timestamp_subsec_millis() as f64 / 1000.0,
                request_id,
                details,
            },
        }
    }
}

/// Top-level error type propagated across the core's public API surface.
///
/// Propagation policy (spec.md §7):
/// - `Validation` variants surface directly to the caller as 4xx.
/// - `Transient` variants are retried locally with bounded backoff before
///   escalating to a `SystemFault` or being surfaced.
/// - `Fatal` variants are recorded on the task record itself.
/// - `SystemFault` variants are logged as alerts, never propagated past the
///   component boundary that detected them.
/// - `ManualIntervention` is returned as a first-class error to the caller
///   *and* persisted as a `ManualTask`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("name conflict: agent '{0}' already exists")]
    NameConflict(String),

    #[error("unknown selection strategy: {0}")]
    BadStrategy(String),

    #[error("no agent available for required capabilities: {0:?}")]
    NoAgentAvailable(Vec<String>),

    #[error("dependency deadlock detected in decomposition for task {0}")]
    DependencyDeadlock(uuid::Uuid),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("backpressure exceeded: {0}")]
    BackpressureExceeded(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid supervisor reference: {0}")]
    InvalidSupervisor(uuid::Uuid),

    #[error("transient failure after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("manual intervention required: {0}")]
    ManualIntervention(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            CoreError::Validation(_) => ErrorType::ValidationError,
            CoreError::NameConflict(_) => ErrorType::NameConflict,
            CoreError::BadStrategy(_) => ErrorType::ValidationError,
            CoreError::NoAgentAvailable(_) => ErrorType::NoAgentAvailable,
            CoreError::DependencyDeadlock(_) => ErrorType::DependencyDeadlock,
            CoreError::Cancelled => ErrorType::InternalError,
            CoreError::BackpressureExceeded(_) => ErrorType::BackpressureExceeded,
            CoreError::NotFound(_) => ErrorType::ValidationError,
            CoreError::InvalidSupervisor(_) => ErrorType::ValidationError,
            CoreError::Transient { .. } => ErrorType::InternalError,
            CoreError::ManualIntervention(_) => ErrorType::ManualInterventionRequired,
            CoreError::Internal(_) => ErrorType::InternalError,
        }
    }

    pub fn to_envelope(&self, request_id: Option<String>) -> ErrorEnvelope {
        ErrorEnvelope::new(self.error_type(), self.to_string(), request_id, None)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
