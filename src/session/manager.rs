use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::warn;

use super::data::SessionData;
use super::error::SessionError;
use super::store::SessionHandler;
use super::{generate_id, is_well_formed_id};

#[derive(Debug)]
struct SessionState {
    id: String,
    data: SessionData,
    is_new: bool,
    dirty: bool,
    destroyed: bool,
    /// Id replaced by `regenerate`, deleted on commit
    previous_id: Option<String>,
}

impl SessionState {
    /// New id; a stored record under the old one is remembered for deletion
    fn rotate_id(&mut self) {
        let old = std::mem::replace(&mut self.id, generate_id());
        if !self.is_new && self.previous_id.is_none() {
            self.previous_id = Some(old);
        }
    }
}

/// Handle to the session of the request being served.
///
/// Cloning shares the same state, so a handler mutating the session through
/// the request it was given is seen by the transport when it commits.
#[derive(Debug, Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    /// New session with a freshly minted id and no stored record
    pub fn fresh() -> Self {
        Self::from_parts(generate_id(), SessionData::new(), true)
    }

    fn from_parts(id: String, data: SessionData, is_new: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                id,
                data,
                is_new,
                dirty: false,
                destroyed: false,
                previous_id: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.lock().data.get_str(key).map(str::to_string)
    }

    /// Writing to an invalidated session starts over under a new id; the
    /// invalidated id is still deleted on commit.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut state = self.lock();
        if state.destroyed {
            state.rotate_id();
            state.destroyed = false;
        }
        state.data.insert(key, value);
        state.dirty = true;
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.lock();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.dirty = true;
        }
        removed
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> SessionData {
        self.lock().data.clone()
    }

    /// Drops all data; the record is deleted on commit.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.data.clear();
        state.destroyed = true;
        state.dirty = false;
    }

    /// Moves the data to a new id (e.g. after login); the old record is
    /// deleted on commit.
    pub fn regenerate(&self) {
        let mut state = self.lock();
        state.rotate_id();
        state.dirty = true;
    }
}

/// What `SessionManager::commit` did, so the transport can set the cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing changed; no storage call was made
    Untouched,
    /// Record written; `id_changed` means the client must learn a new id
    Saved { id: String, id_changed: bool },
    /// Record deleted; the client cookie should be cleared
    Destroyed,
}

/// Loads and commits sessions through an explicit `SessionHandler`.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionHandler>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionHandler>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionHandler> {
        &self.store
    }

    /// Resolves the id presented by the client. Unknown or malformed ids
    /// get a fresh id rather than adopting the client's choice.
    pub async fn load(&self, id: Option<&str>) -> Result<Session, SessionError> {
        let Some(id) = id.filter(|id| is_well_formed_id(id)) else {
            return Ok(Session::fresh());
        };

        let payload = self.store.read(id).await?;
        if payload.is_empty() {
            return Ok(Session::fresh());
        }

        // An undecodable record would fail every request carrying its id
        match SessionData::decode(&payload) {
            Ok(data) => Ok(Session::from_parts(id.to_string(), data, false)),
            Err(e) => {
                warn!("Discarding undecodable session record: {}", e);
                self.store.destroy(id).await?;
                Ok(Session::fresh())
            }
        }
    }

    pub async fn commit(&self, session: &Session) -> Result<CommitOutcome, SessionError> {
        // Copy out what is needed; the lock is never held across an await
        let (id, payload, is_new, destroyed, previous_id) = {
            let mut state = session.lock();
            let payload = if state.dirty && !state.destroyed {
                Some(state.data.encode()?)
            } else {
                None
            };
            state.dirty = false;
            (
                state.id.clone(),
                payload,
                state.is_new,
                state.destroyed,
                state.previous_id.take(),
            )
        };

        let regenerated = previous_id.is_some();
        if let Some(previous) = previous_id {
            self.store.destroy(&previous).await?;
        }

        if destroyed {
            if !is_new {
                self.store.destroy(&id).await?;
            }
            return Ok(CommitOutcome::Destroyed);
        }

        match payload {
            Some(payload) => {
                self.store.write(&id, &payload).await?;
                session.lock().is_new = false;
                Ok(CommitOutcome::Saved {
                    id,
                    id_changed: is_new || regenerated,
                })
            }
            None => Ok(CommitOutcome::Untouched),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use serde_json::json;

    fn manager() -> (SessionManager, MemorySessionStore) {
        let store = MemorySessionStore::new();
        (SessionManager::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn unknown_id_gets_fresh_session() {
        let (manager, _) = manager();
        let presented = generate_id();
        let session = manager.load(Some(&presented)).await.unwrap();
        assert!(session.is_new());
        assert_ne!(session.id(), presented);
    }

    #[tokio::test]
    async fn malformed_id_never_reaches_the_store() {
        let (manager, _) = manager();
        let session = manager.load(Some("../../etc/passwd")).await.unwrap();
        assert!(session.is_new());
    }

    #[tokio::test]
    async fn untouched_session_is_not_written() {
        let (manager, store) = manager();
        let session = manager.load(None).await.unwrap();
        assert_eq!(manager.commit(&session).await.unwrap(), CommitOutcome::Untouched);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn dirty_session_round_trips_through_store() {
        let (manager, store) = manager();
        let session = manager.load(None).await.unwrap();
        session.insert("user_id", json!(7));

        let outcome = manager.commit(&session).await.unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Saved {
                id: session.id(),
                id_changed: true
            }
        );
        assert!(store.contains(&session.id()).await);

        let reloaded = manager.load(Some(&session.id())).await.unwrap();
        assert!(!reloaded.is_new());
        assert_eq!(reloaded.get("user_id"), Some(json!(7)));

        reloaded.insert("flash", "hi");
        assert_eq!(
            manager.commit(&reloaded).await.unwrap(),
            CommitOutcome::Saved {
                id: session.id(),
                id_changed: false
            }
        );
    }

    #[tokio::test]
    async fn invalidate_destroys_record() {
        let (manager, store) = manager();
        let session = manager.load(None).await.unwrap();
        session.insert("k", "v");
        manager.commit(&session).await.unwrap();

        let reloaded = manager.load(Some(&session.id())).await.unwrap();
        reloaded.invalidate();
        assert_eq!(manager.commit(&reloaded).await.unwrap(), CommitOutcome::Destroyed);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn regenerate_moves_data_and_drops_old_record() {
        let (manager, store) = manager();
        let session = manager.load(None).await.unwrap();
        session.insert("k", "v");
        manager.commit(&session).await.unwrap();
        let old_id = session.id();

        let reloaded = manager.load(Some(&old_id)).await.unwrap();
        reloaded.regenerate();
        let outcome = manager.commit(&reloaded).await.unwrap();

        let new_id = reloaded.id();
        assert_ne!(new_id, old_id);
        assert_eq!(
            outcome,
            CommitOutcome::Saved {
                id: new_id.clone(),
                id_changed: true
            }
        );
        assert!(!store.contains(&old_id).await);
        assert!(store.contains(&new_id).await);
    }

    #[tokio::test]
    async fn undecodable_record_is_replaced_by_fresh_session() {
        let (manager, store) = manager();
        let id = generate_id();
        store.write(&id, b"not json").await.unwrap();

        let session = manager.load(Some(&id)).await.unwrap();
        assert!(session.is_new());
        assert_ne!(session.id(), id);
        assert!(!store.contains(&id).await);
    }

    #[tokio::test]
    async fn write_after_invalidate_uses_new_id() {
        let (manager, store) = manager();
        let session = manager.load(None).await.unwrap();
        session.insert("user", "fred");
        manager.commit(&session).await.unwrap();
        let old_id = session.id();

        let reloaded = manager.load(Some(&old_id)).await.unwrap();
        reloaded.invalidate();
        reloaded.insert("flash", "Signed out");
        let outcome = manager.commit(&reloaded).await.unwrap();

        let new_id = reloaded.id();
        assert_ne!(new_id, old_id);
        assert_eq!(
            outcome,
            CommitOutcome::Saved {
                id: new_id.clone(),
                id_changed: true
            }
        );
        assert!(!store.contains(&old_id).await);
        assert_eq!(reloaded.get("user"), None);
        assert_eq!(reloaded.get_str("flash").as_deref(), Some("Signed out"));
        assert_eq!(store.len().await, 1);
    }
}
