/*
[INPUT]:  Session results from the session-server handshake step
[OUTPUT]: Consistent snapshots of the current session token and user
[POS]:    Auth layer - lock-guarded session token lifecycle
[UPDATE]: When adding session metadata or changing lock strategy
*/

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::types::UserKind;

/// Active session data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub id: u64,
    pub token: String,
    pub user_id: u64,
    pub user_kind: UserKind,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_business(&self) -> bool {
        self.user_kind.is_business()
    }
}

/// Thread-safe holder of the current session.
///
/// Token, user id and the business flag are replaced together under a single
/// write lock, so readers see either the old or the new session, never a mix.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    data: Arc<RwLock<Option<SessionData>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current session
    pub fn set_session(&self, session: SessionData) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(session);
    }

    /// Current session token, if a session is active
    pub fn token(&self) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|data| data.token.clone())
    }

    /// Snapshot of the whole session
    pub fn session(&self) -> Option<SessionData> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    pub fn user_id(&self) -> Option<u64> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|data| data.user_id)
    }

    /// False when no session is active
    pub fn is_business(&self) -> bool {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().is_some_and(SessionData::is_business)
    }

    pub fn has_session(&self) -> bool {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.is_some()
    }

    /// Drop the current session
    pub fn clear(&self) -> Option<SessionData> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }
}

/// Short token prefix that is safe to log
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn session(id: u64, token: &str, kind: UserKind) -> SessionData {
        SessionData {
            id,
            token: token.to_string(),
            user_id: id * 10,
            user_kind: kind,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = SessionStore::new();
        assert!(store.token().is_none());
        assert!(!store.has_session());
        assert!(!store.is_business());
    }

    #[test]
    fn test_set_and_clear_session() {
        let store = SessionStore::new();
        store.set_session(session(1, "token-1", UserKind::Company));

        assert_eq!(store.token(), Some("token-1".to_string()));
        assert_eq!(store.user_id(), Some(10));
        assert!(store.is_business());

        let cleared = store.clear().expect("session was set");
        assert_eq!(cleared.id, 1);
        assert!(store.token().is_none());
        assert!(!store.is_business());
    }

    #[test]
    fn test_concurrent_renewals_never_tear() {
        let store = SessionStore::new();
        let writers = 16u64;
        let readers = 32;

        let written: HashSet<(u64, String, bool)> = (0..writers)
            .map(|i| (i, format!("token-{i}"), i % 2 == 0))
            .collect();

        thread::scope(|scope| {
            for i in 0..writers {
                let store = store.clone();
                scope.spawn(move || {
                    let kind = if i % 2 == 0 { UserKind::Company } else { UserKind::Person };
                    store.set_session(session(i, &format!("token-{i}"), kind));
                });
            }
        });

        thread::scope(|scope| {
            for _ in 0..readers {
                let store = store.clone();
                let written = &written;
                scope.spawn(move || {
                    let snapshot = store.session().expect("a session was written");
                    let observed = (snapshot.id, snapshot.token.clone(), snapshot.is_business());
                    assert!(written.contains(&observed), "torn read: {observed:?}");
                    assert_eq!(snapshot.user_id, snapshot.id * 10);
                });
            }
        });
    }

    #[test]
    fn test_reads_during_renewals_see_whole_values() {
        let store = SessionStore::new();
        store.set_session(session(0, "token-0", UserKind::Person));

        thread::scope(|scope| {
            for i in 1..=8u64 {
                let store = store.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        store.set_session(session(i, &format!("token-{i}"), UserKind::Person));
                    }
                });
            }
            for _ in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        let snapshot = store.session().expect("session");
                        assert_eq!(snapshot.token, format!("token-{}", snapshot.id));
                    }
                });
            }
        });
    }

    #[test]
    fn test_redact_keeps_prefix_only() {
        assert_eq!(redact("abcdefghijkl"), "abcdef…");
        assert_eq!(redact("ab"), "ab…");
    }
}
