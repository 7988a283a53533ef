//! Schema validation outcomes and the validator seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// A single validation error reported by the parser service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Error category, e.g. `SyntaxError`.
    pub error_type: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

/// Joins issues into a single `"; "`-separated line.
pub fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The classified result of one validation request, after any retries.
///
/// Only [`ValidationOutcome::TransportFailure`] is ever the product of
/// retrying; the other failure kinds are reported on the first attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The candidate is valid.
    Success {
        /// Parsed structure of the candidate schema.
        parsed: Value,
        /// Structural diff between the old and new schemas.
        diff: Value,
    },
    /// The service understood the request and judged the candidate invalid.
    DomainFailure { errors: Vec<ValidationIssue> },
    /// The service could not be reached, or answered with an unexpected status,
    /// on every attempt.
    TransportFailure { cause: String, attempts: u32 },
    /// The service answered with a success status but an unreadable body.
    ProtocolFailure { detail: String },
    /// Cancelled before a classified answer was obtained.
    Cancelled,
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success { .. })
    }

    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Success { .. } => "success",
            ValidationOutcome::DomainFailure { .. } => "domain_failure",
            ValidationOutcome::TransportFailure { .. } => "transport_failure",
            ValidationOutcome::ProtocolFailure { .. } => "protocol_failure",
            ValidationOutcome::Cancelled => "cancelled",
        }
    }
}

/// Validates a candidate schema against the previously accepted one.
///
/// Implementations must not panic or return early on failure; every failure
/// mode is a [`ValidationOutcome`] variant.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    /// Validates `new_schema`. `old_schema` is the accepted schema, or the
    /// empty string when nothing has been accepted yet.
    ///
    /// # Arguments
    ///
    /// * `old_schema` - The baseline the diff is computed against
    /// * `new_schema` - The candidate to validate
    /// * `cancel` - Aborts in-flight requests and backoff pauses
    async fn validate(
        &self,
        old_schema: &str,
        new_schema: &str,
        cancel: &CancellationToken,
    ) -> ValidationOutcome;
}
