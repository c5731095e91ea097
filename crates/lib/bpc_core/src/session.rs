// @awa-component: SES-SessionIdentity
//
//! Opaque session keys mapped to caller identities.
//!
//! Keys are random 64-character alphanumeric strings. Expiry is lazy:
//! an expired entry is dropped the first time it is looked up.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::debug;

use crate::models::{CharacterId, Identity, Session};

const SESSION_KEY_LEN: usize = 64;

fn generate_session_key() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_KEY_LEN)
        .map(char::from)
        .collect()
}

/// In-process session table.
pub struct SessionIdentity {
    sessions: DashMap<String, Session>,
    ttl: TimeDelta,
}

impl SessionIdentity {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Open a session for `character_id` and return its key.
    pub fn create(&self, character_id: CharacterId) -> String {
        self.create_at(character_id, Utc::now())
    }

    pub fn create_at(&self, character_id: CharacterId, now: DateTime<Utc>) -> String {
        let key = generate_session_key();
        self.sessions.insert(
            key.clone(),
            Session {
                character_id,
                issued_at: now,
            },
        );
        debug!(character_id, "session opened");
        key
    }

    /// Identity behind `session_key`. Unknown or expired keys are anonymous.
    pub fn identify(&self, session_key: &str) -> Identity {
        self.identify_at(session_key, Utc::now())
    }

    pub fn identify_at(&self, session_key: &str, now: DateTime<Utc>) -> Identity {
        let Some(session) = self.sessions.get(session_key).map(|s| s.value().clone()) else {
            return Identity::Anonymous;
        };
        if self.is_expired(&session, now) {
            self.sessions.remove(session_key);
            debug!(character_id = session.character_id, "session expired");
            return Identity::Anonymous;
        }
        Identity::Authenticated {
            character_id: session.character_id,
        }
    }

    /// Close a session. Returns whether it existed.
    pub fn destroy(&self, session_key: &str) -> bool {
        self.sessions.remove(session_key).is_some()
    }

    /// Drop every expired session. Returns the number dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !self.is_expired(s, now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session
            .issued_at
            .checked_add_signed(self.ttl)
            .is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn keys_are_long_and_unique() {
        let sessions = SessionIdentity::new(HOUR);
        let a = sessions.create(1);
        let b = sessions.create(1);
        assert_eq!(a.len(), SESSION_KEY_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn live_session_identifies_character() {
        let sessions = SessionIdentity::new(HOUR);
        let key = sessions.create(90000001);
        assert_eq!(
            sessions.identify(&key),
            Identity::Authenticated {
                character_id: 90000001
            }
        );
    }

    #[test]
    fn unknown_key_is_anonymous() {
        let sessions = SessionIdentity::new(HOUR);
        assert_eq!(sessions.identify("nope"), Identity::Anonymous);
        assert_eq!(sessions.identify(""), Identity::Anonymous);
    }

    #[test]
    fn expired_session_is_anonymous_and_dropped() {
        let sessions = SessionIdentity::new(HOUR);
        let now = Utc::now();
        let key = sessions.create_at(7, now);

        let just_before = now + TimeDelta::minutes(59);
        assert!(sessions.identify_at(&key, just_before).is_authenticated());

        let after = now + TimeDelta::hours(1);
        assert_eq!(sessions.identify_at(&key, after), Identity::Anonymous);
        assert!(sessions.is_empty());
    }

    #[test]
    fn destroy_logs_out() {
        let sessions = SessionIdentity::new(HOUR);
        let key = sessions.create(7);
        assert!(sessions.destroy(&key));
        assert!(!sessions.destroy(&key));
        assert_eq!(sessions.identify(&key), Identity::Anonymous);
    }

    #[test]
    fn purge_drops_only_expired() {
        let sessions = SessionIdentity::new(HOUR);
        let now = Utc::now();
        sessions.create_at(1, now - TimeDelta::hours(2));
        sessions.create_at(2, now - TimeDelta::hours(3));
        let live = sessions.create_at(3, now);

        assert_eq!(sessions.purge_expired_at(now), 2);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions.identify_at(&live, now).character_id(), Some(3));
    }
}
