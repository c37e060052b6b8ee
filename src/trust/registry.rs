// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Durable peer -> trust-level mapping (C4), backed by a `sled` tree.
//!
//! Grounded on the teacher's `peer_registry.rs` (signed-allowlist,
//! startup-seed pattern); the decaying integer reputation score is a
//! supplement to the spec's static trust levels.

use crate::codec::{decode_canonical_limited, encode_canonical};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const MAX_ENTRY_BYTES: usize = 4096;

/// Trust tiers. Ordering matters: `Untrusted < Limited < Standard <
/// Trusted < Admin`, used directly by the authorization check
/// `session.trustLevel < required`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrustLevel {
    /// Denied admission in strict mode; otherwise treated as `Standard`.
    Untrusted,
    /// Reduced rate-limit multiplier (0.25x).
    Limited,
    /// Default level for unknown peers in permissive mode.
    Standard,
    /// Elevated rate-limit multiplier (4x); dialed on startup.
    Trusted,
    /// Unlimited rate; administrative capability.
    Admin,
}

/// A peer trust entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerTrustEntry {
    /// Stable peer identifier (e.g. a libp2p `PeerId` base58 string, or an xpub).
    pub peer_id: String,
    /// Current trust level.
    pub level: TrustLevel,
    /// Unix seconds this entry was first added.
    pub added_at: i64,
    /// Unix seconds this peer was last seen active.
    pub last_seen: i64,
    /// Freeform operator notes.
    pub notes: String,
    /// Decaying integer reputation score, supplementing the static level;
    /// not itself authoritative for admission.
    pub reputation: i32,
}

/// Trust registry errors.
#[derive(Debug, Error)]
pub enum TrustRegistryError {
    /// The embedded store could not be opened or written to.
    #[error("store")]
    Store,
    /// The requested peer has no entry.
    #[error("peer not found")]
    NotFound,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Persistent peer trust registry.
pub struct TrustRegistry {
    tree: sled::Tree,
    strict_mode: bool,
}

impl TrustRegistry {
    /// Open (or create) the registry tree under `db`, seeding `Trusted`
    /// entries for every address in `trusted_peers` that isn't already
    /// present.
    pub fn open(db: &sled::Db, strict_mode: bool, trusted_peers: &[String]) -> Result<Self, TrustRegistryError> {
        let tree = db.open_tree("peer_trust").map_err(|_| TrustRegistryError::Store)?;
        let registry = Self { tree, strict_mode };
        for peer_id in trusted_peers {
            if registry.get(peer_id)?.is_none() {
                registry.upsert(PeerTrustEntry {
                    peer_id: peer_id.clone(),
                    level: TrustLevel::Trusted,
                    added_at: now_unix(),
                    last_seen: now_unix(),
                    notes: "seeded from config".to_string(),
                    reputation: 0,
                })?;
            }
        }
        Ok(registry)
    }

    /// Fetch a peer's entry, if any.
    pub fn get(&self, peer_id: &str) -> Result<Option<PeerTrustEntry>, TrustRegistryError> {
        let raw = self.tree.get(peer_id.as_bytes()).map_err(|_| TrustRegistryError::Store)?;
        match raw {
            Some(bytes) => {
                let entry = decode_canonical_limited(&bytes, MAX_ENTRY_BYTES).map_err(|_| TrustRegistryError::Store)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Insert or replace a peer's entry.
    pub fn upsert(&self, entry: PeerTrustEntry) -> Result<(), TrustRegistryError> {
        let bytes = encode_canonical(&entry).map_err(|_| TrustRegistryError::Store)?;
        self.tree
            .insert(entry.peer_id.as_bytes(), bytes)
            .map_err(|_| TrustRegistryError::Store)?;
        Ok(())
    }

    /// Remove a peer's entry.
    pub fn remove(&self, peer_id: &str) -> Result<(), TrustRegistryError> {
        self.tree.remove(peer_id.as_bytes()).map_err(|_| TrustRegistryError::Store)?;
        Ok(())
    }

    /// List every known entry.
    pub fn list(&self) -> Result<Vec<PeerTrustEntry>, TrustRegistryError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (_, bytes) = item.map_err(|_| TrustRegistryError::Store)?;
            out.push(decode_canonical_limited(&bytes, MAX_ENTRY_BYTES).map_err(|_| TrustRegistryError::Store)?);
        }
        Ok(out)
    }

    /// Classify a peer: an unknown peer resolves to `Untrusted` in
    /// strict mode or `Standard` in permissive (default) mode.
    pub fn classify(&self, peer_id: &str) -> Result<TrustLevel, TrustRegistryError> {
        match self.get(peer_id)? {
            Some(entry) => Ok(entry.level),
            None if self.strict_mode => Ok(TrustLevel::Untrusted),
            None => Ok(TrustLevel::Standard),
        }
    }

    /// Record that a peer was seen, bumping `last_seen` and nudging its
    /// decaying reputation score.
    pub fn observe(&self, peer_id: &str, good: bool) -> Result<(), TrustRegistryError> {
        let mut entry = self.get(peer_id)?.unwrap_or_else(|| PeerTrustEntry {
            peer_id: peer_id.to_string(),
            level: if self.strict_mode { TrustLevel::Untrusted } else { TrustLevel::Standard },
            added_at: now_unix(),
            last_seen: now_unix(),
            notes: String::new(),
            reputation: 0,
        });
        entry.last_seen = now_unix();
        entry.reputation = if good {
            entry.reputation.saturating_add(1).clamp(-1000, 1000)
        } else {
            entry.reputation.saturating_sub(5).clamp(-1000, 1000)
        };
        self.upsert(entry)
    }

    /// Whether the registry was opened in strict mode.
    pub fn is_strict(&self) -> bool {
        self.strict_mode
    }
}
