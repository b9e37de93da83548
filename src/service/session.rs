use async_trait::async_trait;
use base64::Engine;
use rand::RngCore;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::portal::PortalSession;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionService: Send + Sync {
    /// Stores `session` under a fresh id and returns the id for the cookie.
    async fn create(&self, session: &PortalSession) -> Result<String, SessionError>;
    async fn get(&self, session_id: &str) -> Result<Option<PortalSession>, SessionError>;
    async fn save(&self, session_id: &str, session: &PortalSession) -> Result<(), SessionError>;
    async fn delete(&self, session_id: &str) -> Result<(), SessionError>;
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Only a digest of the cookie value is ever used as a storage key.
fn hash_session_id(session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct RedisSessionService {
    conn: Arc<Mutex<MultiplexedConnection>>,
    ttl_seconds: u64,
    key_prefix: String,
}

impl RedisSessionService {
    pub async fn new(
        redis_url: &str,
        ttl_seconds: u64,
        key_prefix: String,
    ) -> Result<Self, SessionError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ttl_seconds,
            key_prefix,
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}:session:{}", self.key_prefix, hash_session_id(session_id))
    }
}

#[async_trait]
impl SessionService for RedisSessionService {
    async fn create(&self, session: &PortalSession) -> Result<String, SessionError> {
        let session_id = generate_session_id();
        self.save(&session_id, session).await?;
        Ok(session_id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<PortalSession>, SessionError> {
        let mut conn = self.conn.lock().await;
        let key = self.key(session_id);
        let value: Option<String> = conn.get(key).await?;
        let Some(value) = value else {
            return Ok(None);
        };
        let session = serde_json::from_str(&value)?;
        Ok(Some(session))
    }

    async fn save(&self, session_id: &str, session: &PortalSession) -> Result<(), SessionError> {
        let value = serde_json::to_string(session)?;
        let mut conn = self.conn.lock().await;
        let key = self.key(session_id);
        conn.set_ex::<_, _, ()>(key, value, self.ttl_seconds).await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.lock().await;
        let key = self.key(session_id);
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// Process-local store for tests and single-instance runs without Redis.
pub struct MemorySessionService {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    ttl: Duration,
}

impl MemorySessionService {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }
}

#[async_trait]
impl SessionService for MemorySessionService {
    async fn create(&self, session: &PortalSession) -> Result<String, SessionError> {
        let session_id = generate_session_id();
        self.save(&session_id, session).await?;
        Ok(session_id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<PortalSession>, SessionError> {
        let mut entries = self.entries.lock().await;
        let key = hash_session_id(session_id);
        let expired = entries
            .get(&key)
            .is_some_and(|(_, expires_at)| *expires_at <= Instant::now());
        if expired {
            entries.remove(&key);
            return Ok(None);
        }
        match entries.get(&key) {
            Some((value, _)) => Ok(Some(serde_json::from_str(value)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session_id: &str, session: &PortalSession) -> Result<(), SessionError> {
        let value = serde_json::to_string(session)?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(hash_session_id(session_id), (value, now + self.ttl));
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.entries.lock().await.remove(&hash_session_id(session_id));
        Ok(())
    }
}

/// Serializes read-modify-write cycles on one session within this process,
/// so two concurrent requests cannot both open a checkout.
#[derive(Default)]
pub struct SessionLocks {
    locks: std::sync::Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl SessionLocks {
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);
            let key = hash_session_id(session_id);
            match locks.get(&key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(key, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

/// Session store plus the per-session lock, as handlers use them.
pub struct PortalSessions {
    store: Arc<dyn SessionService>,
    locks: SessionLocks,
}

impl PortalSessions {
    pub fn new(store: Arc<dyn SessionService>) -> Self {
        Self {
            store,
            locks: SessionLocks::default(),
        }
    }

    pub async fn create(&self, session: &PortalSession) -> Result<String, SessionError> {
        self.store.create(session).await
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.store.delete(session_id).await
    }

    /// Locks and loads the session. `Ok(None)` when the id is unknown or expired.
    pub async fn open(&self, session_id: &str) -> Result<Option<OpenSession>, SessionError> {
        let guard = self.locks.acquire(session_id).await;
        let Some(session) = self.store.get(session_id).await? else {
            return Ok(None);
        };
        Ok(Some(OpenSession {
            session_id: session_id.to_string(),
            session,
            store: self.store.clone(),
            _guard: guard,
        }))
    }
}

/// A loaded session held under its lock until it is saved or ended.
pub struct OpenSession {
    session_id: String,
    pub session: PortalSession,
    store: Arc<dyn SessionService>,
    _guard: OwnedMutexGuard<()>,
}

impl OpenSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn save(self) -> Result<(), SessionError> {
        self.store.save(&self.session_id, &self.session).await
    }

    pub async fn end(self) -> Result<(), SessionError> {
        tracing::info!("ending portal session");
        self.store.delete(&self.session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::fixture;

    #[tokio::test]
    async fn open_session_saves_changes_under_lock() {
        let sessions = PortalSessions::new(Arc::new(MemorySessionService::new(60)));
        let sid = sessions.create(&PortalSession::default()).await.expect("create");

        let mut open = sessions.open(&sid).await.expect("open").expect("exists");
        let ticket = open.session.begin_view("/gallery");
        open.save().await.expect("save");

        let open = sessions.open(&sid).await.expect("open").expect("exists");
        assert!(open.session.is_current(&ticket));
        open.end().await.expect("end");
        assert!(sessions.open(&sid).await.expect("open").is_none());
    }

    #[tokio::test]
    async fn memory_store_round_trips_and_deletes() {
        let store = MemorySessionService::new(60);
        let session = PortalSession::signed_in("token".to_string(), fixture("a1"));
        let sid = store.create(&session).await.expect("create");
        assert_eq!(store.get(&sid).await.expect("get"), Some(session));

        store.delete(&sid).await.expect("delete");
        assert_eq!(store.get(&sid).await.expect("get"), None);
    }

    #[tokio::test]
    async fn expired_sessions_are_gone() {
        let store = MemorySessionService::new(0);
        let sid = store.create(&PortalSession::default()).await.expect("create");
        assert_eq!(store.get(&sid).await.expect("get"), None);
    }

    #[test]
    fn session_ids_are_random_and_hashed() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert_eq!(hash_session_id(&a).len(), 64);
        assert_ne!(hash_session_id(&a), a);
    }

    #[tokio::test]
    async fn session_lock_is_exclusive() {
        let locks = SessionLocks::default();
        let guard = locks.acquire("sid").await;
        let second = tokio::time::timeout(Duration::from_millis(20), locks.acquire("sid")).await;
        assert!(second.is_err());
        drop(guard);
        let _again = locks.acquire("sid").await;
        let _other = locks.acquire("other").await;
    }
}
