//! Session registry: the only owner of in-memory per-session state.
//!
//! Each session lives behind its own async mutex. Work on one session is
//! serialised by holding that mutex for the whole operation; different
//! sessions never contend beyond the brief map lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::assistant::render::RenderCache;
use crate::assistant::store::SectionStore;

#[derive(Debug)]
pub struct SessionState {
    pub store: SectionStore,
    pub render_cache: RenderCache,
    /// Set under the lock when the session is deleted. A waiter that acquires
    /// a deleted state must look the session up again.
    pub deleted: bool,
}

impl SessionState {
    pub fn new(store: SectionStore) -> Self {
        Self {
            store,
            render_cache: RenderCache::default(),
            deleted: false,
        }
    }
}

pub type SessionHandle = Arc<AsyncMutex<SessionState>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    /// Returns the existing handle, or registers `state` for the session.
    /// When two callers race to register, the first one wins and the other's
    /// state is dropped.
    pub fn get_or_insert(&self, session_id: &str, state: SessionState) -> SessionHandle {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(state)))
            .clone()
    }

    pub fn evict(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::sections::{Section, SectionLayout};

    fn empty_state() -> SessionState {
        SessionState::new(SectionStore::new(SectionLayout::default()))
    }

    #[tokio::test]
    async fn test_first_registration_wins() {
        let registry = SessionRegistry::default();
        let first = registry.get_or_insert("a", empty_state());
        first.lock().await.store.update(Section::Skills, "Rust");

        let second = registry.get_or_insert("a", empty_state());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.store.get(Section::Skills).items(), vec!["Rust"]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::default();
        let a = registry.get_or_insert("a", empty_state());
        let b = registry.get_or_insert("b", empty_state());

        // Holding one session's lock does not block another session.
        let _guard = a.lock().await;
        assert!(b.try_lock().is_ok());
        assert!(a.try_lock().is_err());
    }

    #[test]
    fn test_evict() {
        let registry = SessionRegistry::default();
        registry.get_or_insert("a", empty_state());
        assert!(registry.evict("a"));
        assert!(!registry.evict("a"));
        assert!(registry.get("a").is_none());
    }
}
