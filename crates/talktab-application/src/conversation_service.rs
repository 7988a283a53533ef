//! Conversation use case: resolve a session, run an exchange, persist it.

use crate::orchestrator::{ExchangeError, ExchangeOutcome, Orchestrator};
use crate::session::{SessionHandle, SessionRegistry};
use std::sync::Arc;
use talktab_core::conversation::{ConversationRepository, ConversationState};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),
}

/// Entry point for sending user messages to a conversation.
///
/// Sessions are loaded from the repository on first use and cached in the
/// registry afterwards. Committed state is saved after every exchange that
/// keeps its state, before the next exchange on the session may start.
pub struct ConversationService {
    registry: SessionRegistry,
    repository: Arc<dyn ConversationRepository>,
    orchestrator: Orchestrator,
}

impl ConversationService {
    pub fn new(repository: Arc<dyn ConversationRepository>, orchestrator: Orchestrator) -> Self {
        Self {
            registry: SessionRegistry::new(),
            repository,
            orchestrator,
        }
    }

    /// Returns the live handle for a session, loading or creating it.
    pub async fn session(&self, session_id: &str) -> anyhow::Result<Arc<SessionHandle>> {
        self.registry
            .get_or_load(session_id, || async {
                let state = self
                    .repository
                    .find_by_id(session_id)
                    .await?
                    .unwrap_or_else(|| {
                        tracing::info!(session_id, "Starting new conversation");
                        ConversationState::new(session_id)
                    });
                Ok::<_, anyhow::Error>(Arc::new(SessionHandle::new(state)))
            })
            .await
    }

    /// Sends one user message and returns the engine's final answer.
    ///
    /// # Arguments
    ///
    /// * `session_id` - The conversation to continue (created if unknown)
    /// * `text` - The user's message
    /// * `cancel` - Aborts the exchange without committing anything
    pub async fn send(
        &self,
        session_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ExchangeOutcome, ConversationError> {
        let handle = self
            .session(session_id)
            .await
            .map_err(ConversationError::Storage)?;

        // Save under the exchange lock so saves land in commit order
        let guard = handle.lock_exchange().await;
        let result = self
            .orchestrator
            .run_locked(&handle, &guard, text, cancel)
            .await;
        let keeps_state = match &result {
            Ok(_) => true,
            Err(err) => err.keeps_state(),
        };
        if keeps_state {
            self.persist(&handle).await?;
        }
        drop(guard);

        Ok(result?)
    }

    /// Copy of a session's committed state.
    pub async fn snapshot(&self, session_id: &str) -> anyhow::Result<ConversationState> {
        Ok(self.session(session_id).await?.snapshot().await)
    }

    /// IDs of every stored conversation.
    pub async fn list_sessions(&self) -> anyhow::Result<Vec<String>> {
        self.repository.list_ids().await
    }

    async fn persist(&self, handle: &SessionHandle) -> Result<(), ConversationError> {
        let state = handle.snapshot().await;
        self.repository
            .save(&state)
            .await
            .map_err(ConversationError::Storage)?;
        tracing::debug!(session_id = state.session_id(), "Conversation saved");
        Ok(())
    }
}
