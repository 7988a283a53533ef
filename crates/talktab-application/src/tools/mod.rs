//! Tool catalogue: the operations the reasoning engine can invoke.
//!
//! Every invocation produces exactly one [`ToolResult`] carrying its
//! invocation id. Tool-level failures (bad arguments, rejected schemas, an
//! unreachable validator) are reported in the result and never raised.

mod cell;
pub mod handlers;

pub use cell::StateCell;
pub use handlers::ToolHandler;

use futures::future::join_all;
use handlers::{ReadAcceptedSchemaHandler, ReadPendingSchemaHandler, ValidateAndApplyHandler};
use std::collections::HashMap;
use std::sync::Arc;
use talktab_core::tool::{
    ToolCall, ToolDefinition, ToolInvocation, ToolKind, ToolResult, ToolStatus,
};
use talktab_core::validation::SchemaValidator;
use tokio_util::sync::CancellationToken;

pub struct ToolCatalogue {
    handlers: HashMap<ToolKind, Arc<dyn ToolHandler>>,
    definitions: Vec<ToolDefinition>,
}

impl ToolCatalogue {
    /// Builds the catalogue with the standard handler for every [`ToolKind`].
    pub fn new(validator: Arc<dyn SchemaValidator>) -> Self {
        let mut handlers: HashMap<ToolKind, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert(ToolKind::ReadAcceptedSchema, Arc::new(ReadAcceptedSchemaHandler));
        handlers.insert(ToolKind::ReadPendingSchema, Arc::new(ReadPendingSchemaHandler));
        handlers.insert(
            ToolKind::ValidateAndApply,
            Arc::new(ValidateAndApplyHandler::new(validator)),
        );

        Self {
            handlers,
            definitions: ToolKind::catalogue(),
        }
    }

    /// Tool definitions advertised to the reasoning engine.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Executes one invocation against the shared exchange state.
    pub async fn execute(
        &self,
        invocation: &ToolInvocation,
        cell: &StateCell,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let call = match ToolCall::parse(&invocation.name, &invocation.arguments) {
            Ok(call) => call,
            Err(err) => {
                tracing::warn!(
                    invocation_id = %invocation.id,
                    tool = %invocation.name,
                    error = %err,
                    "Rejected malformed tool invocation"
                );
                return ToolResult::new(invocation, ToolStatus::InvalidInput, err.to_string());
            }
        };

        let Some(handler) = self.handlers.get(&call.kind()) else {
            return ToolResult::new(
                invocation,
                ToolStatus::InvalidInput,
                format!("no handler registered for {}", call.kind()),
            );
        };

        tracing::debug!(invocation_id = %invocation.id, tool = %call.kind(), "Executing tool");
        let result = handler.execute(&call, invocation, cell, cancel).await;
        tracing::info!(
            invocation_id = %invocation.id,
            tool = %call.kind(),
            status = %result.status,
            "Tool finished"
        );
        result
    }

    /// Executes invocations concurrently; results come back in request order.
    pub async fn execute_all(
        &self,
        invocations: &[ToolInvocation],
        cell: &StateCell,
        cancel: &CancellationToken,
    ) -> Vec<ToolResult> {
        join_all(
            invocations
                .iter()
                .map(|invocation| self.execute(invocation, cell, cancel)),
        )
        .await
    }
}
