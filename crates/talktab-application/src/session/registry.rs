use super::handle::SessionHandle;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide map of live sessions, keyed by session ID.
///
/// Avoids reloading a conversation from storage on every exchange.
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,
}

impl SessionRegistry {
    /// Creates a new empty SessionRegistry.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Gets a live session by ID.
    ///
    /// # Returns
    ///
    /// `Some(handle)` if the session is registered, `None` otherwise.
    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// Registers a session handle, replacing any previous one with the same ID.
    pub async fn insert(&self, handle: Arc<SessionHandle>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(handle.session_id().to_string(), handle);
    }

    /// Returns the registered handle, or registers the one produced by `load`.
    ///
    /// The loader runs outside the registry lock. If another caller
    /// registered the same session meanwhile, its handle wins and the loaded
    /// one is discarded, so every caller shares a single handle.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        session_id: &str,
        load: F,
    ) -> Result<Arc<SessionHandle>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<SessionHandle>, E>>,
    {
        if let Some(handle) = self.get(session_id).await {
            return Ok(handle);
        }

        let loaded = load().await?;
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(session_id.to_string())
            .or_insert(loaded)
            .clone())
    }

    /// Removes a session from the registry.
    pub async fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
    }

    /// IDs of all live sessions, sorted.
    pub async fn session_ids(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Clears all registered sessions.
    pub async fn clear(&self) {
        let mut sessions = self.sessions.write().await;
        sessions.clear();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
