// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Single-use authentication challenges, guarded by one mutex per
//! spec.md's concurrency model (§5: "one mutex guards the challenge
//! table").

use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const CHALLENGE_TTL_SECS: i64 = 60;

/// A pending authentication challenge.
#[derive(Clone, Debug)]
pub struct Challenge {
    /// 16-byte random id, hex-encoded.
    pub id: String,
    /// The xpub this challenge is bound to.
    pub xpub: String,
    /// The client's claimed Ed25519 public key.
    pub client_public_key: [u8; 32],
    /// 32 random bytes the client must sign.
    pub challenge_bytes: [u8; 32],
    /// Unix seconds this challenge was created.
    pub created_at: i64,
    /// Unix seconds this challenge expires (`created_at + 60`).
    pub expires_at: i64,
}

/// Challenge lookup/verification errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    /// No challenge with this id exists (or it was already consumed).
    #[error("challenge not found")]
    NotFound,
    /// The challenge existed but is past `expires_at`.
    #[error("challenge expired")]
    Expired,
    /// The supplied xpub or challenge bytes don't match the stored challenge.
    #[error("challenge mismatch")]
    Mismatch,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// In-memory single-use challenge table.
pub struct ChallengeStore {
    inner: Mutex<HashMap<String, Challenge>>,
}

impl Default for ChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    /// Allocate and store a new challenge, running a bounded GC pass first.
    pub fn create(&self, xpub: &str, client_public_key: [u8; 32]) -> Challenge {
        let mut table = self.inner.lock();
        Self::gc_locked(&mut table);

        let mut id_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut id_bytes);
        let mut challenge_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut challenge_bytes);

        let created_at = now_unix();
        let challenge = Challenge {
            id: hex::encode(id_bytes),
            xpub: xpub.to_string(),
            client_public_key,
            challenge_bytes,
            created_at,
            expires_at: created_at + CHALLENGE_TTL_SECS,
        };
        table.insert(challenge.id.clone(), challenge.clone());
        challenge
    }

    /// Atomically look up and remove a pending challenge (single-use),
    /// validating it against the caller-supplied xpub and challenge bytes.
    pub fn take(&self, id: &str, xpub: &str, challenge_bytes: &[u8; 32]) -> Result<Challenge, ChallengeError> {
        let challenge = self.take_for_xpub(id, xpub)?;
        if &challenge.challenge_bytes != challenge_bytes {
            return Err(ChallengeError::Mismatch);
        }
        Ok(challenge)
    }

    /// Atomically look up and remove a pending challenge (single-use),
    /// validating only that it was issued for `xpub`. Used by the verify
    /// route, which never re-receives the challenge bytes from the
    /// client — it looks them up here to check the submitted signature.
    pub fn take_for_xpub(&self, id: &str, xpub: &str) -> Result<Challenge, ChallengeError> {
        let mut table = self.inner.lock();
        Self::gc_locked(&mut table);

        let challenge = table.remove(id).ok_or(ChallengeError::NotFound)?;
        if now_unix() > challenge.expires_at {
            return Err(ChallengeError::Expired);
        }
        if challenge.xpub != xpub {
            return Err(ChallengeError::Mismatch);
        }
        Ok(challenge)
    }

    fn gc_locked(table: &mut HashMap<String, Challenge>) {
        let now = now_unix();
        table.retain(|_, c| c.expires_at >= now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_single_use() {
        let store = ChallengeStore::new();
        let challenge = store.create("xpub1", [1u8; 32]);
        let bytes = challenge.challenge_bytes;
        assert!(store.take(&challenge.id, "xpub1", &bytes).is_ok());
        assert_eq!(store.take(&challenge.id, "xpub1", &bytes).unwrap_err(), ChallengeError::NotFound);
    }

    #[test]
    fn take_rejects_mismatched_xpub() {
        let store = ChallengeStore::new();
        let challenge = store.create("xpub1", [1u8; 32]);
        let bytes = challenge.challenge_bytes;
        assert_eq!(
            store.take(&challenge.id, "wrong-xpub", &bytes).unwrap_err(),
            ChallengeError::Mismatch
        );
    }

    #[test]
    fn take_rejects_mismatched_bytes() {
        let store = ChallengeStore::new();
        let challenge = store.create("xpub1", [1u8; 32]);
        assert_eq!(
            store.take(&challenge.id, "xpub1", &[0u8; 32]).unwrap_err(),
            ChallengeError::Mismatch
        );
    }

    #[test]
    fn expired_challenge_is_rejected() {
        let store = ChallengeStore::new();
        let mut challenge = store.create("xpub1", [1u8; 32]);
        {
            let mut table = store.inner.lock();
            challenge.expires_at = now_unix() - 1;
            table.insert(challenge.id.clone(), challenge.clone());
        }
        let bytes = challenge.challenge_bytes;
        assert_eq!(
            store.take(&challenge.id, "xpub1", &bytes).unwrap_err(),
            ChallengeError::Expired
        );
    }
}
