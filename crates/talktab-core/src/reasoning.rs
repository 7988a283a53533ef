//! The reasoning-engine seam.
//!
//! The engine decides what to do next: given the conversation history, the
//! accepted schema and the tool catalogue, it either answers in natural
//! language or requests one or more tool invocations.

use crate::conversation::ConversationMessage;
use crate::tool::{ToolDefinition, ToolInvocation};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Input for one reasoning step.
#[derive(Debug, Clone)]
pub struct ReasoningRequest<'a> {
    /// Full message history, oldest first.
    pub messages: &'a [ConversationMessage],
    /// The current accepted schema ("" when none).
    pub accepted_schema: &'a str,
    /// Tools the engine may request.
    pub tools: &'a [ToolDefinition],
}

/// Output of one reasoning step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReasoningResponse {
    pub content: String,
    /// Requested tools, in request order. Empty for a terminal answer.
    pub tool_invocations: Vec<ToolInvocation>,
}

impl ReasoningResponse {
    /// A terminal, natural-language answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }

    /// A response requesting tools.
    pub fn tool_calls(tool_invocations: Vec<ToolInvocation>) -> Self {
        Self {
            content: String::new(),
            tool_invocations,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.tool_invocations.is_empty()
    }
}

/// Errors raised by a reasoning engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasoningError {
    /// The engine could not be invoked (missing credentials, bad request).
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The remote API failed.
    ///
    /// Engines never retry on their own; `is_retryable` and `retry_after`
    /// are hints for whoever drives the conversation.
    #[error("Process error (status: {status_code:?}): {message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    /// The engine answered with something that is neither text nor tool calls.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ReasoningError {
    /// Whether the caller could reasonably try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReasoningError::ProcessError {
                is_retryable: true,
                ..
            }
        )
    }

    /// How long the remote API asked the caller to wait, if it said.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ReasoningError::ProcessError { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// A natural-language reasoning engine.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Runs one reasoning step.
    async fn respond(
        &self,
        request: ReasoningRequest<'_>,
    ) -> Result<ReasoningResponse, ReasoningError>;
}
