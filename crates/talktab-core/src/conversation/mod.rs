//! Conversation domain module.
//!
//! This module contains the conversation record, its messages, the schema
//! update type, and the persistence trait.

pub mod message;
pub mod repository;
pub mod state;

pub use message::{ConversationMessage, MessageRole};
pub use repository::ConversationRepository;
pub use state::{ConversationState, StateUpdate};
