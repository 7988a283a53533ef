use std::sync::Arc;
use talktab_core::conversation::ConversationState;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Owns one session's committed conversation state.
///
/// Exchanges for the same session are serialized through [`lock_exchange`];
/// each exchange works on a snapshot and commits it back when it completes.
///
/// [`lock_exchange`]: SessionHandle::lock_exchange
pub struct SessionHandle {
    session_id: String,
    state: RwLock<ConversationState>,
    exchange: Mutex<()>,
}

impl SessionHandle {
    /// Wraps an existing conversation state.
    pub fn new(state: ConversationState) -> Self {
        Self {
            session_id: state.session_id().to_string(),
            state: RwLock::new(state),
            exchange: Mutex::new(()),
        }
    }

    /// Creates a handle for a brand-new conversation.
    pub fn create(session_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(ConversationState::new(session_id)))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns a copy of the committed state.
    pub async fn snapshot(&self) -> ConversationState {
        self.state.read().await.clone()
    }

    /// Reads the committed state without copying it.
    pub async fn read<R>(&self, f: impl FnOnce(&ConversationState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Waits until no other exchange is running on this session.
    pub async fn lock_exchange(&self) -> MutexGuard<'_, ()> {
        self.exchange.lock().await
    }

    /// Replaces the committed state.
    pub(crate) async fn commit(&self, state: ConversationState) {
        *self.state.write().await = state;
    }
}
