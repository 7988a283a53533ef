//! Client for the external schema validation service.
//!
//! The service exposes `POST /parse-dbml` taking the old and new schema and
//! answering with a parsed representation and a diff, or a list of errors.
//! [`ValidationClient`] owns retries and failure classification; a
//! [`ValidationTransport`] performs one delivery attempt.

use crate::backoff::RetryPolicy;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use talktab_core::config::ValidatorConfig;
use talktab_core::error::{Result, TalktabError};
use talktab_core::validation::{SchemaValidator, ValidationIssue, ValidationOutcome};
use tokio_util::sync::CancellationToken;

const GENERIC_ERROR_TYPE: &str = "ValidationError";

/// The classified result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Accepted { parsed: Value, diff: Value },
    Rejected(Vec<ValidationIssue>),
    /// Worth retrying.
    Transport(String),
    /// Not worth retrying.
    Protocol(String),
}

/// Performs one validation request against the service.
#[async_trait]
pub trait ValidationTransport: Send + Sync {
    async fn attempt(&self, old_schema: &str, new_schema: &str) -> AttemptOutcome;

    /// Probes service liveness. Advisory only.
    async fn health(&self) -> bool;

    /// Where the service lives, for messages.
    fn endpoint(&self) -> &str;
}

#[derive(Serialize)]
struct ParseRequest<'a> {
    old_dbml_string: &'a str,
    new_dbml_string: &'a str,
}

/// [`ValidationTransport`] over HTTP.
#[derive(Clone)]
pub struct HttpValidationTransport {
    client: Client,
    base_url: String,
}

impl HttpValidationTransport {
    /// Creates a transport with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TalktabError::config(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ValidatorConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), config.timeout())
    }
}

#[async_trait]
impl ValidationTransport for HttpValidationTransport {
    async fn attempt(&self, old_schema: &str, new_schema: &str) -> AttemptOutcome {
        let url = format!("{}/parse-dbml", self.base_url);
        let body = ParseRequest {
            old_dbml_string: old_schema,
            new_dbml_string: new_schema,
        };

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = if err.is_timeout() {
                    "timed out"
                } else if err.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                return AttemptOutcome::Transport(format!("{kind}: {err}"));
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(text) => classify_response(status, &text),
            Err(err) => AttemptOutcome::Transport(format!(
                "failed to read response body (HTTP {status}): {err}"
            )),
        }
    }

    async fn health(&self) -> bool {
        let url = format!("{}/", self.base_url);
        let Ok(response) = self.client.get(&url).send().await else {
            return false;
        };
        if !response.status().is_success() {
            return false;
        }
        response
            .json::<Value>()
            .await
            .map(|body| body.get("status").and_then(Value::as_str) == Some("ok"))
            .unwrap_or(false)
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

/// Classifies a complete HTTP response from the validation service.
///
/// - 400: domain rejection.
/// - 2xx with `"success": false` or a non-empty `errors`: domain rejection.
/// - 2xx with an unreadable body or no `schema_json`: protocol failure.
/// - Any other status: transport failure.
pub fn classify_response(status: StatusCode, body: &str) -> AttemptOutcome {
    if status == StatusCode::BAD_REQUEST {
        let value = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
        return AttemptOutcome::Rejected(extract_issues(&value));
    }

    if !status.is_success() {
        return AttemptOutcome::Transport(format!("validator returned HTTP {status}"));
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => return AttemptOutcome::Protocol(format!("unreadable response body: {err}")),
    };
    let Some(object) = value.as_object() else {
        return AttemptOutcome::Protocol("response body is not a JSON object".to_string());
    };

    let declared_failure = object.get("success").and_then(Value::as_bool) == Some(false);
    if declared_failure || has_errors(object.get("errors")) {
        return AttemptOutcome::Rejected(extract_issues(&value));
    }

    let parsed = match object.get("schema_json") {
        Some(parsed) if !parsed.is_null() => parsed.clone(),
        _ => return AttemptOutcome::Protocol("response is missing schema_json".to_string()),
    };
    let diff = match object.get("diff_json") {
        Some(diff) if !diff.is_null() => diff.clone(),
        _ => json!({}),
    };

    AttemptOutcome::Accepted { parsed, diff }
}

fn has_errors(errors: Option<&Value>) -> bool {
    match errors {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Reads the error list out of a rejection body.
///
/// Accepts `errors` as a list of `{error_type, message}` objects, a list of
/// strings, or a single string; falls back to `error` and then `message`.
pub fn extract_issues(body: &Value) -> Vec<ValidationIssue> {
    let issues: Vec<ValidationIssue> = match body.get("errors") {
        Some(Value::Array(items)) => items.iter().map(issue_from_value).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            vec![ValidationIssue::new(GENERIC_ERROR_TYPE, s.clone())]
        }
        _ => Vec::new(),
    };
    if !issues.is_empty() {
        return issues;
    }

    for key in ["error", "message"] {
        if let Some(value) = body.get(key).filter(|v| !v.is_null()) {
            return vec![issue_from_value(value)];
        }
    }

    vec![ValidationIssue::new(
        GENERIC_ERROR_TYPE,
        "the validator rejected the schema without details",
    )]
}

fn issue_from_value(value: &Value) -> ValidationIssue {
    match value {
        Value::String(s) => ValidationIssue::new(GENERIC_ERROR_TYPE, s.clone()),
        Value::Object(map) => {
            let error_type = map
                .get("error_type")
                .or_else(|| map.get("type"))
                .and_then(Value::as_str)
                .unwrap_or(GENERIC_ERROR_TYPE);
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            ValidationIssue::new(error_type, message)
        }
        other => ValidationIssue::new(GENERIC_ERROR_TYPE, other.to_string()),
    }
}

/// Validates schemas through a [`ValidationTransport`], retrying transport
/// failures with exponential backoff.
///
/// Domain rejections and protocol failures are returned on the attempt that
/// produced them. Cancellation is honoured both during a request and during
/// a backoff pause.
pub struct ValidationClient<T = HttpValidationTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl ValidationClient<HttpValidationTransport> {
    /// Creates an HTTP-backed client from configuration.
    pub fn from_config(config: &ValidatorConfig) -> Result<Self> {
        Ok(Self::new(
            HttpValidationTransport::from_config(config)?,
            RetryPolicy::from_config(config),
        ))
    }
}

impl<T: ValidationTransport> ValidationClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Probes the service. A failing probe is reported, never fatal.
    pub async fn health_check(&self) -> bool {
        let healthy = self.transport.health().await;
        if !healthy {
            tracing::warn!(
                endpoint = self.transport.endpoint(),
                "Schema validator health check failed"
            );
        }
        healthy
    }
}

#[async_trait]
impl<T: ValidationTransport> SchemaValidator for ValidationClient<T> {
    async fn validate(
        &self,
        old_schema: &str,
        new_schema: &str,
        cancel: &CancellationToken,
    ) -> ValidationOutcome {
        let attempts = self.policy.attempts();
        let mut last_cause = String::new();

        for attempt in 1..=attempts {
            if !self.policy.pause_before(attempt, cancel).await {
                tracing::info!(attempt, "Validation cancelled during backoff");
                return ValidationOutcome::Cancelled;
            }

            tracing::debug!(attempt, max_attempts = attempts, "Sending schema to validator");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(attempt, "Validation cancelled during request");
                    return ValidationOutcome::Cancelled;
                }
                outcome = self.transport.attempt(old_schema, new_schema) => outcome,
            };

            match outcome {
                AttemptOutcome::Accepted { parsed, diff } => {
                    tracing::info!(attempt, "Schema accepted by validator");
                    return ValidationOutcome::Success { parsed, diff };
                }
                AttemptOutcome::Rejected(errors) => {
                    tracing::info!(attempt, errors = errors.len(), "Schema rejected by validator");
                    return ValidationOutcome::DomainFailure { errors };
                }
                AttemptOutcome::Protocol(detail) => {
                    tracing::warn!(attempt, %detail, "Unreadable validator response");
                    return ValidationOutcome::ProtocolFailure { detail };
                }
                AttemptOutcome::Transport(cause) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        %cause,
                        "Validator transport failure"
                    );
                    last_cause = cause;
                }
            }
        }

        tracing::error!(
            attempts,
            endpoint = self.transport.endpoint(),
            "Validator unreachable after all attempts"
        );
        ValidationOutcome::TransportFailure {
            cause: format!("{last_cause} ({})", self.transport.endpoint()),
            attempts,
        }
    }
}
