//! The turn-taking state machine.
//!
//! One exchange starts with a user message and alternates between an agent
//! turn (one reasoning-engine call) and a tool turn (every requested tool,
//! run concurrently) until the engine answers without requesting tools.
//!
//! The exchange works on a copy of the session state. The copy is committed
//! back when the exchange finishes or hits the cycle limit; any other abort
//! discards it, so a cancelled exchange leaves no trace.

use crate::session::SessionHandle;
use crate::tools::{StateCell, ToolCatalogue};
use std::collections::HashSet;
use std::sync::Arc;
use talktab_core::config::OrchestratorConfig;
use talktab_core::conversation::{ConversationMessage, ConversationState};
use talktab_core::reasoning::{ReasoningEngine, ReasoningError, ReasoningRequest};
use talktab_core::tool::{ToolInvocation, ToolStatus};
use thiserror::Error;
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Where an exchange currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    /// Waiting on the reasoning engine.
    AgentTurn,
    /// Executing the tools requested by the last agent turn.
    ToolTurn(Vec<ToolInvocation>),
    /// The engine produced a final answer.
    Terminal(String),
}

impl TurnState {
    fn name(&self) -> &'static str {
        match self {
            TurnState::AgentTurn => "agent_turn",
            TurnState::ToolTurn(_) => "tool_turn",
            TurnState::Terminal(_) => "terminal",
        }
    }
}

/// A completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOutcome {
    /// The engine's final answer.
    pub reply: String,
    /// Number of tool turns the exchange took.
    pub cycles: u32,
}

/// Why an exchange ended without a final answer.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// The engine kept requesting tools. State is kept up to the last tool result.
    #[error("Exchange stopped after {limit} tool cycles without a final answer")]
    StepLimitExceeded { limit: u32 },

    /// Nothing from the exchange was kept.
    #[error("Exchange cancelled")]
    Cancelled,

    /// Nothing from the exchange was kept.
    #[error("Reasoning engine failed: {0}")]
    Reasoning(#[from] ReasoningError),

    /// The engine reused an invocation id. Nothing from the exchange was kept.
    #[error("Reasoning engine reused tool invocation id '{0}'")]
    DuplicateInvocationId(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// Whether the session state was updated despite the error.
    pub fn keeps_state(&self) -> bool {
        matches!(self, ExchangeError::StepLimitExceeded { .. })
    }
}

pub struct Orchestrator {
    engine: Arc<dyn ReasoningEngine>,
    catalogue: Arc<ToolCatalogue>,
    max_cycles: u32,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        catalogue: Arc<ToolCatalogue>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            engine,
            catalogue,
            max_cycles: config.max_cycles,
        }
    }

    pub fn max_cycles(&self) -> u32 {
        self.max_cycles
    }

    /// Runs one exchange for a session.
    ///
    /// Waits for any exchange already running on the same session.
    ///
    /// # Arguments
    ///
    /// * `handle` - The session to run against
    /// * `user_text` - The user's message
    /// * `cancel` - Aborts the exchange; nothing is committed
    ///
    /// # Returns
    ///
    /// The engine's final answer, or why the exchange stopped. The state is
    /// committed on success and on [`ExchangeError::StepLimitExceeded`].
    pub async fn run_exchange(
        &self,
        handle: &SessionHandle,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let guard = handle.lock_exchange().await;
        self.run_locked(handle, &guard, user_text, cancel).await
    }

    /// Runs one exchange while the caller holds the session's exchange lock.
    ///
    /// Lets the caller do more work under the same lock after the commit,
    /// such as saving the committed state.
    pub async fn run_locked(
        &self,
        handle: &SessionHandle,
        _guard: &MutexGuard<'_, ()>,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let span = tracing::info_span!("exchange", session_id = %handle.session_id());
        async {
            let cell = StateCell::new(handle.snapshot().await);
            if let Err(e) = cell.push_message(ConversationMessage::user(user_text)).await {
                return Err(ExchangeError::Internal(e.to_string()));
            }

            let result = self.drive(&cell, cancel).await;
            match &result {
                Ok(outcome) => {
                    handle.commit(cell.into_inner()).await;
                    tracing::info!(cycles = outcome.cycles, "Exchange complete");
                }
                Err(err) if err.keeps_state() => {
                    handle.commit(cell.into_inner()).await;
                    tracing::warn!(error = %err, "Exchange stopped at cycle limit");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Exchange aborted; nothing committed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        cell: &StateCell,
        cancel: &CancellationToken,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let mut cycles = 0u32;
        let mut turn = TurnState::AgentTurn;

        loop {
            tracing::debug!(turn = turn.name(), cycles, "Turn");
            turn = match turn {
                TurnState::AgentTurn => {
                    if cancel.is_cancelled() {
                        return Err(ExchangeError::Cancelled);
                    }

                    let snapshot = cell.snapshot().await;
                    let request = ReasoningRequest {
                        messages: snapshot.messages(),
                        accepted_schema: snapshot.accepted_schema(),
                        tools: self.catalogue.definitions(),
                    };
                    let response = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ExchangeError::Cancelled),
                        response = self.engine.respond(request) => response?,
                    };

                    if response.is_terminal() {
                        cell.push_message(ConversationMessage::assistant(
                            response.content.clone(),
                            Vec::new(),
                        ))
                        .await
                        .map_err(|e| ExchangeError::Internal(e.to_string()))?;
                        TurnState::Terminal(response.content)
                    } else {
                        if cycles >= self.max_cycles {
                            return Err(ExchangeError::StepLimitExceeded {
                                limit: self.max_cycles,
                            });
                        }
                        if let Some(id) = duplicate_id(&response.tool_invocations, &snapshot) {
                            return Err(ExchangeError::DuplicateInvocationId(id));
                        }

                        tracing::info!(
                            requested = response.tool_invocations.len(),
                            "Engine requested tools"
                        );
                        cell.push_message(ConversationMessage::assistant(
                            response.content,
                            response.tool_invocations.clone(),
                        ))
                        .await
                        .map_err(|e| ExchangeError::Internal(e.to_string()))?;
                        TurnState::ToolTurn(response.tool_invocations)
                    }
                }
                TurnState::ToolTurn(invocations) => {
                    cycles += 1;
                    let results = self.catalogue.execute_all(&invocations, cell, cancel).await;
                    if cancel.is_cancelled()
                        || results.iter().any(|r| r.status == ToolStatus::Cancelled)
                    {
                        return Err(ExchangeError::Cancelled);
                    }

                    for result in results {
                        cell.push_message(ConversationMessage::tool(result))
                            .await
                            .map_err(|e| ExchangeError::Internal(e.to_string()))?;
                    }
                    TurnState::AgentTurn
                }
                TurnState::Terminal(reply) => return Ok(ExchangeOutcome { reply, cycles }),
            };
        }
    }
}

/// Finds an id reused within the response or already present in the conversation.
fn duplicate_id(
    invocations: &[ToolInvocation],
    state: &ConversationState,
) -> Option<String> {
    let mut seen = HashSet::new();
    invocations
        .iter()
        .find(|inv| !seen.insert(inv.id.as_str()) || state.has_invocation_id(&inv.id))
        .map(|inv| inv.id.clone())
}
