use talktab_core::conversation::{ConversationMessage, ConversationState, StateUpdate};
use talktab_core::error::Result;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Shared conversation state for the tool calls of one exchange.
///
/// Reads take the state lock briefly. A mutating tool holds the mutation
/// lock across its whole read-validate-write sequence, so mutations are
/// serialized and each one lands as a single step.
pub struct StateCell {
    state: RwLock<ConversationState>,
    mutation: Mutex<()>,
}

impl StateCell {
    pub fn new(state: ConversationState) -> Self {
        Self {
            state: RwLock::new(state),
            mutation: Mutex::new(()),
        }
    }

    /// Runs `f` against the current state under a read lock.
    pub async fn read<R>(&self, f: impl FnOnce(&ConversationState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    pub async fn snapshot(&self) -> ConversationState {
        self.state.read().await.clone()
    }

    /// Acquires the exclusive mutation lock.
    pub async fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().await
    }

    /// Applies a schema update. Callers must hold the mutation lock.
    pub async fn apply(&self, _guard: &MutexGuard<'_, ()>, update: StateUpdate) {
        self.state.write().await.apply(update);
    }

    pub async fn push_message(&self, message: ConversationMessage) -> Result<()> {
        self.state.write().await.push_message(message)
    }

    pub fn into_inner(self) -> ConversationState {
        self.state.into_inner()
    }
}
