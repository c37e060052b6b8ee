// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Cookie-bound session table, guarded by one mutex.

use crate::trust::TrustLevel;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// An authenticated session.
#[derive(Clone, Debug)]
pub struct Session {
    /// Opaque, random, URL-safe bearer token.
    pub token: String,
    /// The xpub this session authenticates as.
    pub xpub: String,
    /// Trust level snapshotted at login time.
    pub trust_level: TrustLevel,
    /// Unix seconds the session was created.
    pub created_at: i64,
    /// Unix seconds the session expires (absolute, not sliding).
    pub expires_at: i64,
    /// Client IP at login time, for audit purposes.
    pub client_ip: String,
    /// Client User-Agent at login time, for audit purposes.
    pub user_agent: String,
}

impl Session {
    /// Whether this session is expired as of `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Session lookup errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No session exists for this token.
    #[error("session not found")]
    NotFound,
    /// The session existed but is past `expires_at`.
    #[error("session expired")]
    Expired,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// In-memory session table.
pub struct SessionStore {
    inner: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Construct a store with the configured session TTL (spec.md default: 24h).
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Mutex::new(HashMap::new()), ttl }
    }

    /// Create and store a new session, returning it (its `token` becomes the cookie value).
    pub fn create(&self, xpub: &str, trust_level: TrustLevel, client_ip: &str, user_agent: &str) -> Session {
        let created_at = now_unix();
        let session = Session {
            token: random_token(),
            xpub: xpub.to_string(),
            trust_level,
            created_at,
            expires_at: created_at + self.ttl.as_secs() as i64,
            client_ip: client_ip.to_string(),
            user_agent: user_agent.to_string(),
        };
        self.inner.lock().insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a session by token, rejecting (and evicting) expired ones.
    pub fn get(&self, token: &str) -> Result<Session, SessionError> {
        let mut table = self.inner.lock();
        let session = table.get(token).cloned().ok_or(SessionError::NotFound)?;
        if session.is_expired(now_unix()) {
            table.remove(token);
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    /// Revoke (remove) a session. Idempotent.
    pub fn revoke(&self, token: &str) {
        self.inner.lock().remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_get_roundtrip() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let session = store.create("xpub1", TrustLevel::Standard, "127.0.0.1", "test-agent");
        let fetched = store.get(&session.token).unwrap();
        assert_eq!(fetched.xpub, "xpub1");
    }

    #[test]
    fn expired_session_is_evicted_on_get() {
        let store = SessionStore::new(Duration::from_secs(0));
        let session = store.create("xpub1", TrustLevel::Standard, "127.0.0.1", "test-agent");
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(store.get(&session.token).unwrap_err(), SessionError::Expired);
        assert_eq!(store.get(&session.token).unwrap_err(), SessionError::NotFound);
    }

    #[test]
    fn revoke_is_idempotent() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let session = store.create("xpub1", TrustLevel::Standard, "127.0.0.1", "test-agent");
        store.revoke(&session.token);
        store.revoke(&session.token);
        assert_eq!(store.get(&session.token).unwrap_err(), SessionError::NotFound);
    }
}
