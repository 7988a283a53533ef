//! Domain layer for Talking Tables.
//!
//! Holds the conversation record, the tool-call protocol, the validation
//! outcome and the seams to the outside world (reasoning engine, schema
//! validator, conversation storage). Nothing here performs I/O.

pub mod config;
pub mod conversation;
pub mod error;
pub mod reasoning;
pub mod tool;
pub mod validation;

// Re-export common error type
pub use error::{Result, TalktabError};

pub use conversation::{
    ConversationMessage, ConversationRepository, ConversationState, MessageRole, StateUpdate,
};
pub use reasoning::{ReasoningEngine, ReasoningError, ReasoningRequest, ReasoningResponse};
pub use tool::{
    ToolCall, ToolDefinition, ToolInvocation, ToolKind, ToolResult, ToolStatus,
    ValidateAndApplyArgs,
};
pub use validation::{SchemaValidator, ValidationIssue, ValidationOutcome, join_issues};
