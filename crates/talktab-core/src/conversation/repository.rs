//! Conversation repository trait.
//!
//! Defines the interface for conversation persistence operations.

use super::state::ConversationState;
use anyhow::Result;
use async_trait::async_trait;

/// An abstract repository for managing conversation persistence.
///
/// Decouples the orchestration core from the storage mechanism (JSON files,
/// in-memory map, database). The core never deletes conversations; `delete`
/// exists for external teardown policy.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Finds a conversation by its session ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ConversationState))`: Conversation found
    /// - `Ok(None)`: Conversation not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<ConversationState>>;

    /// Saves a conversation, replacing any previous version.
    async fn save(&self, state: &ConversationState) -> Result<()>;

    /// Deletes a conversation (succeeds if it didn't exist).
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Lists the session IDs of all stored conversations, sorted.
    async fn list_ids(&self) -> Result<Vec<String>>;
}
