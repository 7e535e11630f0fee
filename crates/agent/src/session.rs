//! Per-user session memory.
//!
//! Keeps the last intent, action, and entity per user plus a small string
//! context map, so follow-ups like "stop it" can resolve against the last
//! touched resource. Entries expire after a TTL; nothing is persisted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

const DEFAULT_TTL_SECS: i64 = 3_600;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub last_intent: Option<String>,
    pub last_action: Option<String>,
    pub last_entity: Option<String>,
    pub context: HashMap<String, String>,
}

#[derive(Clone, Debug, Default)]
pub struct SessionUpdate {
    pub intent: Option<String>,
    pub action: Option<String>,
    pub entity: Option<String>,
    pub context: Vec<(String, String)>,
}

impl SessionUpdate {
    pub fn intent(key: impl Into<String>) -> Self {
        Self { intent: Some(key.into()), ..Self::default() }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug)]
struct Entry {
    session: Session,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    inner: Mutex<HashMap<String, Entry>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl_secs(DEFAULT_TTL_SECS)
    }

    pub fn with_ttl_secs(ttl_secs: i64) -> Self {
        Self { ttl: Duration::seconds(ttl_secs), inner: Mutex::new(HashMap::new()) }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, user_id: &str) -> Session {
        let guard = self.guard();
        match guard.get(user_id) {
            Some(entry) if Utc::now() - entry.updated_at < self.ttl => entry.session.clone(),
            _ => Session::default(),
        }
    }

    pub fn update(&self, user_id: &str, update: SessionUpdate) {
        let mut guard = self.guard();
        let now = Utc::now();
        let entry = guard
            .entry(user_id.to_string())
            .or_insert_with(|| Entry { session: Session::default(), updated_at: now });

        if now - entry.updated_at >= self.ttl {
            entry.session = Session::default();
        }

        if let Some(intent) = update.intent {
            entry.session.last_intent = Some(intent);
        }
        if let Some(action) = update.action {
            entry.session.last_action = Some(action);
        }
        if let Some(entity) = update.entity {
            entry.session.last_entity = Some(entity);
        }
        for (key, value) in update.context {
            entry.session.context.insert(key, value);
        }
        entry.updated_at = now;
    }

    pub fn clear(&self, user_id: &str) {
        self.guard().remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionStore, SessionUpdate};

    #[test]
    fn updates_accumulate_per_user() {
        let store = SessionStore::new();
        store.update("u1", SessionUpdate::intent("create_vpc").entity("vpc-00000001"));
        store.update("u1", SessionUpdate::default().context("last_instance_id", "i-00000003"));

        let session = store.get("u1");
        assert_eq!(session.last_intent.as_deref(), Some("create_vpc"));
        assert_eq!(session.last_entity.as_deref(), Some("vpc-00000001"));
        assert_eq!(session.context.get("last_instance_id").map(String::as_str), Some("i-00000003"));
    }

    #[test]
    fn users_are_isolated() {
        let store = SessionStore::new();
        store.update("u1", SessionUpdate::intent("create_bucket"));
        assert!(store.get("u2").last_intent.is_none());
    }

    #[test]
    fn expired_sessions_read_as_fresh() {
        let store = SessionStore::with_ttl_secs(0);
        store.update("u1", SessionUpdate::intent("create_vpc"));
        assert!(store.get("u1").last_intent.is_none());
    }

    #[test]
    fn clear_resets_a_user() {
        let store = SessionStore::new();
        store.update("u1", SessionUpdate::intent("create_vpc"));
        store.clear("u1");
        assert_eq!(store.get("u1"), super::Session::default());
    }
}
