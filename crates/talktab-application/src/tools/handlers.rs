//! The three schema tools.

use super::cell::StateCell;
use async_trait::async_trait;
use std::sync::Arc;
use talktab_core::conversation::StateUpdate;
use talktab_core::tool::{ToolCall, ToolInvocation, ToolResult, ToolStatus};
use talktab_core::validation::{SchemaValidator, ValidationOutcome, join_issues};
use tokio_util::sync::CancellationToken;

pub const NO_ACCEPTED_SCHEMA: &str = "No accepted schema yet (empty, starting fresh).";
pub const NO_PENDING_SCHEMA: &str = "No pending schema.";
pub const ACCEPTED_MESSAGE: &str =
    "DBML parsing successful. The candidate is now the accepted schema.";
pub const REJECTED_PREFIX: &str = "Your schema was rejected by the validator: ";
pub const UNREACHABLE_PREFIX: &str = "The schema validator is unreachable";
pub const UNREADABLE_PREFIX: &str = "The schema validator returned an unreadable response";

/// Executes one kind of tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(
        &self,
        call: &ToolCall,
        invocation: &ToolInvocation,
        cell: &StateCell,
        cancel: &CancellationToken,
    ) -> ToolResult;
}

pub struct ReadAcceptedSchemaHandler;

#[async_trait]
impl ToolHandler for ReadAcceptedSchemaHandler {
    async fn execute(
        &self,
        _call: &ToolCall,
        invocation: &ToolInvocation,
        cell: &StateCell,
        _cancel: &CancellationToken,
    ) -> ToolResult {
        let content = cell
            .read(|state| match state.accepted_schema() {
                "" => NO_ACCEPTED_SCHEMA.to_string(),
                schema => schema.to_string(),
            })
            .await;
        ToolResult::new(invocation, ToolStatus::Success, content)
    }
}

pub struct ReadPendingSchemaHandler;

#[async_trait]
impl ToolHandler for ReadPendingSchemaHandler {
    async fn execute(
        &self,
        _call: &ToolCall,
        invocation: &ToolInvocation,
        cell: &StateCell,
        _cancel: &CancellationToken,
    ) -> ToolResult {
        let content = cell
            .read(|state| match state.pending_schema() {
                "" => NO_PENDING_SCHEMA.to_string(),
                schema => schema.to_string(),
            })
            .await;
        ToolResult::new(invocation, ToolStatus::Success, content)
    }
}

pub struct ValidateAndApplyHandler {
    validator: Arc<dyn SchemaValidator>,
}

impl ValidateAndApplyHandler {
    pub fn new(validator: Arc<dyn SchemaValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl ToolHandler for ValidateAndApplyHandler {
    async fn execute(
        &self,
        call: &ToolCall,
        invocation: &ToolInvocation,
        cell: &StateCell,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let ToolCall::ValidateAndApply(args) = call else {
            return ToolResult::new(
                invocation,
                ToolStatus::InvalidInput,
                format!("{} is not handled by validate_and_apply", call.kind()),
            );
        };
        let candidate = args.candidate_schema.as_str();
        if candidate.trim().is_empty() {
            return ToolResult::new(
                invocation,
                ToolStatus::InvalidInput,
                "candidate_schema must not be empty",
            );
        }

        let guard = cell.lock_mutation().await;
        let accepted = cell.read(|state| state.accepted_schema().to_string()).await;

        match self.validator.validate(&accepted, candidate, cancel).await {
            ValidationOutcome::Success { parsed, diff } => {
                cell.apply(&guard, StateUpdate::accepted(candidate, parsed, diff))
                    .await;
                ToolResult::new(invocation, ToolStatus::Success, ACCEPTED_MESSAGE)
            }
            ValidationOutcome::DomainFailure { errors } => {
                cell.apply(&guard, StateUpdate::rejected(candidate)).await;
                let content = format!("{REJECTED_PREFIX}{}", join_issues(&errors));
                ToolResult::new(invocation, ToolStatus::Rejected, content).with_errors(errors)
            }
            ValidationOutcome::TransportFailure { cause, attempts } => ToolResult::new(
                invocation,
                ToolStatus::Unreachable,
                format!(
                    "{UNREACHABLE_PREFIX} after {attempts} attempt(s): {cause}. \
                     The accepted schema is unchanged; try again later."
                ),
            ),
            ValidationOutcome::ProtocolFailure { detail } => ToolResult::new(
                invocation,
                ToolStatus::ProtocolError,
                format!("{UNREADABLE_PREFIX}: {detail}. The accepted schema is unchanged."),
            ),
            ValidationOutcome::Cancelled => {
                ToolResult::new(invocation, ToolStatus::Cancelled, "Validation was cancelled.")
            }
        }
    }
}
