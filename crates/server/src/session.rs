//! Signed-cookie sessions backed by a pluggable context store.
//!
//! The cookie only carries a random session id and its HMAC-SHA256
//! signature; the conversational context lives server-side.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chatrelay_core::SessionContext;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session secret cannot be used as an hmac key")]
    InvalidKey,
    #[error("session store failure: {0}")]
    Store(String),
}

/// Issues and verifies `<id>.<hex signature>` cookie values.
#[derive(Clone)]
pub struct SessionCookie {
    name: String,
    mac: HmacSha256,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, secret: &SecretString) -> Result<Self, SessionError> {
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| SessionError::InvalidKey)?;
        Ok(Self { name: name.into(), mac })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encode(&self, id: &SessionId) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_str().as_bytes());
        format!("{id}.{}", encode_hex(&mac.finalize().into_bytes()))
    }

    /// Returns the session id when the value carries a valid signature.
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (id, signature) = value.split_once('.')?;
        if id.is_empty() {
            return None;
        }
        let signature = decode_hex(signature)?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(SessionId(id.to_string()))
    }

    /// First correctly signed session cookie in the request, if any.
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == self.name)
            .find_map(|(_, value)| self.verify(value))
    }

    pub fn set_cookie_value(&self, id: &SessionId) -> String {
        format!("{}={}; Path=/; HttpOnly; SameSite=Lax", self.name, self.encode(id))
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 || !input.is_ascii() {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&input[index..index + 2], 16).ok())
        .collect()
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionContext>, SessionError>;
    async fn save(&self, id: &SessionId, context: SessionContext) -> Result<(), SessionError>;
    async fn clear(&self, id: &SessionId) -> Result<(), SessionError>;
    /// Drops expired sessions and returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, SessionError>;
}

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(1800);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct StoredSession {
    context: SessionContext,
    touched: Instant,
}

/// Process-local store; concurrent saves for one session are last-write-wins.
///
/// Sessions idle for longer than `idle_ttl` are invisible to `load` and are
/// dropped on the next sweep. At most `max_sessions` are held; saving a new
/// session into a full store evicts the least recently touched one.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, StoredSession>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl InMemorySessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), idle_ttl, max_sessions: max_sessions.max(1) }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn is_expired(&self, session: &StoredSession, now: Instant) -> bool {
        now.saturating_duration_since(session.touched) > self.idle_ttl
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionContext>, SessionError> {
        let sessions = self.sessions.read().await;
        let now = Instant::now();
        Ok(sessions
            .get(id)
            .filter(|session| !self.is_expired(session, now))
            .map(|session| session.context.clone()))
    }

    async fn save(&self, id: &SessionId, context: SessionContext) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        if !sessions.contains_key(id) && sessions.len() >= self.max_sessions {
            sessions.retain(|_, session| !self.is_expired(session, now));
            if sessions.len() >= self.max_sessions {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, session)| session.touched)
                    .map(|(oldest, _)| oldest.clone());
                if let Some(oldest) = oldest {
                    sessions.remove(&oldest);
                    debug!(
                        event_name = "session.store.evicted",
                        max_sessions = self.max_sessions,
                        "session store full; evicted least recently used session"
                    );
                }
            }
        }

        sessions.insert(id.clone(), StoredSession { context, touched: now });
        Ok(())
    }

    async fn clear(&self, id: &SessionId) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session, now));
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderMap, HeaderValue};
    use chatrelay_core::SessionContext;
    use secrecy::SecretString;
    use serde_json::json;

    use std::time::Duration;

    use super::{InMemorySessionStore, SessionCookie, SessionId, SessionStore};

    fn cookie() -> SessionCookie {
        SessionCookie::new("chatrelay_session", &SecretString::from("a-long-enough-session-secret".to_string()))
            .expect("cookie signer")
    }

    #[test]
    fn signed_value_round_trips_through_verify() {
        let signer = cookie();
        let id = SessionId::generate();

        let value = signer.encode(&id);

        assert_eq!(value.split_once('.').map(|(prefix, _)| prefix), Some(id.as_str()));
        assert_eq!(signer.verify(&value), Some(id));
    }

    #[test]
    fn tampered_or_foreign_signatures_are_rejected() {
        let signer = cookie();
        let id = SessionId::generate();
        let value = signer.encode(&id);
        let (_, signature) = value.split_once('.').expect("signed value");

        assert_eq!(signer.verify(&format!("{}.{signature}", SessionId::generate())), None);
        assert_eq!(signer.verify(id.as_str()), None);
        assert_eq!(signer.verify(&format!("{id}.zz")), None);
        assert_eq!(signer.verify(&format!(".{signature}")), None);

        let other = SessionCookie::new("chatrelay_session", &SecretString::from("another-secret-value".to_string()))
            .expect("cookie signer");
        assert_eq!(other.verify(&value), None);
    }

    #[test]
    fn session_is_read_from_cookie_header() {
        let signer = cookie();
        let id = SessionId::generate();
        let mut headers = HeaderMap::new();
        let cookie_header = format!("theme=dark; chatrelay_session={}", signer.encode(&id));
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie_header).expect("header"));

        assert_eq!(signer.from_headers(&headers), Some(id));
        assert_eq!(signer.from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn set_cookie_value_carries_attributes() {
        let signer = cookie();
        let id = SessionId::generate();

        let value = signer.set_cookie_value(&id);

        assert!(value.starts_with(&format!("chatrelay_session={id}.")));
        assert!(value.ends_with("; Path=/; HttpOnly; SameSite=Lax"));
    }

    #[tokio::test]
    async fn in_memory_store_saves_loads_and_clears() {
        let store = InMemorySessionStore::default();
        let id = SessionId::generate();
        let mut context = SessionContext::new();
        context.insert("conversation_id", json!("c-1"));

        assert_eq!(store.load(&id).await.expect("load"), None);
        store.save(&id, context.clone()).await.expect("save");
        assert_eq!(store.load(&id).await.expect("load"), Some(context));
        store.clear(&id).await.expect("clear");
        assert_eq!(store.load(&id).await.expect("load"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire_and_are_purged() {
        let store = InMemorySessionStore::new(Duration::from_secs(60), 100);
        let stale = SessionId::generate();
        let fresh = SessionId::generate();
        store.save(&stale, SessionContext::new()).await.expect("save");

        tokio::time::advance(Duration::from_secs(45)).await;
        store.save(&fresh, SessionContext::new()).await.expect("save");
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(store.load(&stale).await.expect("load"), None);
        assert_eq!(store.load(&fresh).await.expect("load"), Some(SessionContext::new()));
        assert_eq!(store.purge_expired().await.expect("purge"), 1);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_evicts_least_recently_touched_session() {
        let store = InMemorySessionStore::new(Duration::from_secs(3600), 3);
        let ids: Vec<SessionId> = (0..3).map(|_| SessionId::generate()).collect();
        for id in &ids {
            store.save(id, SessionContext::new()).await.expect("save");
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        store.save(&ids[0], SessionContext::new()).await.expect("touch");

        let newcomer = SessionId::generate();
        store.save(&newcomer, SessionContext::new()).await.expect("save");

        assert_eq!(store.session_count().await, 3);
        assert_eq!(store.load(&ids[1]).await.expect("load"), None);
        assert!(store.load(&ids[0]).await.expect("load").is_some());
        assert!(store.load(&newcomer).await.expect("load").is_some());
    }
}
