//! In-memory conversation repository, for tests and throwaway sessions.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use talktab_core::conversation::{ConversationRepository, ConversationState};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<ConversationState>> {
        Ok(self.conversations.read().await.get(session_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        self.conversations
            .write()
            .await
            .insert(state.session_id().to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.conversations.write().await.remove(session_id);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crud() {
        let repo = InMemoryConversationRepository::new();
        repo.save(&ConversationState::new("b")).await.unwrap();
        repo.save(&ConversationState::new("a")).await.unwrap();
        assert_eq!(repo.list_ids().await.unwrap(), vec!["a", "b"]);
        assert!(repo.find_by_id("a").await.unwrap().is_some());
        repo.delete("a").await.unwrap();
        assert!(repo.find_by_id("a").await.unwrap().is_none());
    }
}
