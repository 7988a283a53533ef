//! Application layer for Talking Tables.
//!
//! This crate coordinates the domain types into use cases: the tool
//! catalogue, the orchestrator that runs an exchange, and the conversation
//! service that ties sessions to storage.

pub mod conversation_service;
pub mod orchestrator;
pub mod session;
pub mod tools;

pub use conversation_service::{ConversationError, ConversationService};
pub use orchestrator::{ExchangeError, ExchangeOutcome, Orchestrator, TurnState};
pub use session::{SessionHandle, SessionRegistry};
pub use tools::{StateCell, ToolCatalogue, ToolHandler};
