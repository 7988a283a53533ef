//! Conversation message types.
//!
//! A conversation is a list of messages from three kinds of speakers: the
//! user, the assistant (the reasoning engine) and tools. Assistant messages may
//! request tool invocations; tool messages answer exactly one of them.

use crate::tool::{ToolInvocation, ToolResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the reasoning engine.
    Assistant,
    /// Result of a tool invocation.
    Tool,
}

/// A single message in a conversation history.
///
/// Each variant carries a timestamp indicating when it was created (RFC 3339).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationMessage {
    User {
        content: String,
        timestamp: String,
    },
    Assistant {
        content: String,
        /// Tools requested by this turn, in request order.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_invocations: Vec<ToolInvocation>,
        timestamp: String,
    },
    Tool {
        result: ToolResult,
        timestamp: String,
    },
}

impl ConversationMessage {
    /// Creates a user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            timestamp: now(),
        }
    }

    /// Creates an assistant message stamped with the current time.
    pub fn assistant(content: impl Into<String>, tool_invocations: Vec<ToolInvocation>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_invocations,
            timestamp: now(),
        }
    }

    /// Creates a tool-result message stamped with the current time.
    pub fn tool(result: ToolResult) -> Self {
        Self::Tool {
            result,
            timestamp: now(),
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Self::User { .. } => MessageRole::User,
            Self::Assistant { .. } => MessageRole::Assistant,
            Self::Tool { .. } => MessageRole::Tool,
        }
    }

    /// The message text. For tool messages this is the result content.
    pub fn content(&self) -> &str {
        match self {
            Self::User { content, .. } | Self::Assistant { content, .. } => content,
            Self::Tool { result, .. } => &result.content,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Self::User { timestamp, .. }
            | Self::Assistant { timestamp, .. }
            | Self::Tool { timestamp, .. } => timestamp,
        }
    }

    /// Tool invocations requested by this message (empty unless assistant).
    pub fn tool_invocations(&self) -> &[ToolInvocation] {
        match self {
            Self::Assistant {
                tool_invocations, ..
            } => tool_invocations,
            _ => &[],
        }
    }

    /// The tool result carried by this message, if it is a tool message.
    pub fn tool_result(&self) -> Option<&ToolResult> {
        match self {
            Self::Tool { result, .. } => Some(result),
            _ => None,
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}
