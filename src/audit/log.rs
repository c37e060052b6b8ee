// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Tamper-evident, hash-linked audit log, generalizing the teacher
//! keystore's best-effort `append_audit` JSON-lines trail into a proper
//! chain with `VerifyChain` (spec.md §4.7, invariant I4).

use crate::codec::{decode_canonical_limited, encode_canonical};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const MAX_ENTRY_BYTES: usize = 16 * 1024;

/// 64 ASCII zeros: the `previousHash` of the first entry in a chain.
fn genesis_hash() -> String {
    "0".repeat(64)
}

/// Event severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine, informational event.
    Info,
    /// Notable but non-failing event.
    Warning,
    /// A handled failure.
    Error,
    /// An unhandled or security-relevant failure.
    Critical,
}

/// A single audit entry, hash-linked to its predecessor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonically increasing id, also the chain order.
    pub id: u64,
    /// Unix seconds (UTC).
    pub timestamp: i64,
    /// Taxonomy string (see [`super::event_types`]).
    pub event_type: String,
    /// Severity.
    pub severity: Severity,
    /// Who performed the action (xpub, username, or "system").
    pub actor_id: String,
    /// The actor's IP address, if known.
    pub actor_ip: String,
    /// The kind of thing acted upon (e.g. "peer", "session", "plugin").
    pub target_type: String,
    /// The specific target's id.
    pub target_id: String,
    /// Human-readable description.
    pub description: String,
    /// Arbitrary structured detail, serialized as JSON text.
    pub details_json: String,
    /// Hex SHA-256 of the predecessor entry (64 zero ASCII chars at genesis).
    pub previous_hash: String,
    /// Hex SHA-256 of this entry's fields (see [`entry_hash`]).
    pub entry_hash: String,
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
        Severity::Critical => "critical",
    }
}

fn entry_hash(
    timestamp: i64,
    event_type: &str,
    severity: Severity,
    actor_id: &str,
    actor_ip: &str,
    target_type: &str,
    target_id: &str,
    description: &str,
    details_json: &str,
    previous_hash: &str,
) -> String {
    let input = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        timestamp,
        event_type,
        severity_str(severity),
        actor_id,
        actor_ip,
        target_type,
        target_id,
        description,
        details_json,
        previous_hash,
    );
    hex::encode(Sha256::digest(input.as_bytes()))
}

impl AuditEntry {
    fn recompute_hash(&self) -> String {
        entry_hash(
            self.timestamp,
            &self.event_type,
            self.severity,
            &self.actor_id,
            &self.actor_ip,
            &self.target_type,
            &self.target_id,
            &self.description,
            &self.details_json,
            &self.previous_hash,
        )
    }
}

/// Audit log errors.
#[derive(Debug, Error)]
pub enum AuditLogError {
    /// The embedded store could not be opened, read, or written.
    #[error("store")]
    Store,
    /// Chain verification found a break, naming the first offending id.
    #[error("audit log tampered at entry {0}")]
    Tampered(u64),
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// A query over the audit log.
#[derive(Clone, Debug, Default)]
pub struct AuditQuery {
    /// Restrict to this event type, if set.
    pub event_type: Option<String>,
    /// Restrict to this severity, if set.
    pub severity: Option<Severity>,
    /// Restrict to this actor id, if set.
    pub actor_id: Option<String>,
    /// Inclusive lower timestamp bound, if set.
    pub since: Option<i64>,
    /// Inclusive upper timestamp bound, if set.
    pub until: Option<i64>,
    /// Maximum entries to return.
    pub limit: usize,
    /// Entries to skip, applied after filtering, before limiting.
    pub offset: usize,
}

/// Append-only, hash-linked, `sled`-backed audit log.
pub struct AuditLog {
    tree: sled::Tree,
    tail: parking_lot::Mutex<(u64, String)>,
}

impl AuditLog {
    /// Open the audit tree under `db`, loading the max-id entry's hash as
    /// the in-memory tail so the chain stays continuous across restarts.
    pub fn open(db: &sled::Db) -> Result<Self, AuditLogError> {
        let tree = db.open_tree("audit_log").map_err(|_| AuditLogError::Store)?;
        let tail = match tree.iter().next_back() {
            Some(Ok((_, bytes))) => {
                let entry: AuditEntry =
                    decode_canonical_limited(&bytes, MAX_ENTRY_BYTES).map_err(|_| AuditLogError::Store)?;
                (entry.id, entry.entry_hash)
            }
            _ => (0, genesis_hash()),
        };
        Ok(Self { tree, tail: parking_lot::Mutex::new(tail) })
    }

    /// Append a new entry under the single append mutex, chaining it to
    /// the current tail.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        event_type: &str,
        severity: Severity,
        actor_id: &str,
        actor_ip: &str,
        target_type: &str,
        target_id: &str,
        description: &str,
        details_json: &str,
    ) -> Result<AuditEntry, AuditLogError> {
        let mut tail = self.tail.lock();
        let (last_id, previous_hash) = tail.clone();
        let id = last_id + 1;
        let timestamp = now_unix();
        let hash = entry_hash(
            timestamp,
            event_type,
            severity,
            actor_id,
            actor_ip,
            target_type,
            target_id,
            description,
            details_json,
            &previous_hash,
        );

        let entry = AuditEntry {
            id,
            timestamp,
            event_type: event_type.to_string(),
            severity,
            actor_id: actor_id.to_string(),
            actor_ip: actor_ip.to_string(),
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            description: description.to_string(),
            details_json: details_json.to_string(),
            previous_hash,
            entry_hash: hash.clone(),
        };

        let bytes = encode_canonical(&entry).map_err(|_| AuditLogError::Store)?;
        self.tree.insert(id_key(id), bytes).map_err(|_| AuditLogError::Store)?;
        self.tree.flush().map_err(|_| AuditLogError::Store)?;
        *tail = (id, hash);
        Ok(entry)
    }

    fn load(&self, id: u64) -> Result<Option<AuditEntry>, AuditLogError> {
        match self.tree.get(id_key(id)).map_err(|_| AuditLogError::Store)? {
            Some(bytes) => Ok(Some(
                decode_canonical_limited(&bytes, MAX_ENTRY_BYTES).map_err(|_| AuditLogError::Store)?,
            )),
            None => Ok(None),
        }
    }

    /// Scan the chain in ascending id order, verifying every link and
    /// every recomputed hash. Returns the id of the first break, if any.
    pub fn verify_chain(&self) -> Result<(), AuditLogError> {
        let mut expected_previous = genesis_hash();
        for item in self.tree.iter() {
            let (_, bytes) = item.map_err(|_| AuditLogError::Store)?;
            let entry: AuditEntry =
                decode_canonical_limited(&bytes, MAX_ENTRY_BYTES).map_err(|_| AuditLogError::Store)?;
            if entry.previous_hash != expected_previous {
                return Err(AuditLogError::Tampered(entry.id));
            }
            if entry.entry_hash != entry.recompute_hash() {
                return Err(AuditLogError::Tampered(entry.id));
            }
            expected_previous = entry.entry_hash.clone();
        }
        Ok(())
    }

    /// Query entries, newest first, applying filters before paging.
    pub fn query(&self, q: &AuditQuery) -> Result<Vec<AuditEntry>, AuditLogError> {
        let mut matches = Vec::new();
        for item in self.tree.iter().rev() {
            let (_, bytes) = item.map_err(|_| AuditLogError::Store)?;
            let entry: AuditEntry =
                decode_canonical_limited(&bytes, MAX_ENTRY_BYTES).map_err(|_| AuditLogError::Store)?;
            if let Some(ref t) = q.event_type {
                if &entry.event_type != t {
                    continue;
                }
            }
            if let Some(s) = q.severity {
                if entry.severity != s {
                    continue;
                }
            }
            if let Some(ref a) = q.actor_id {
                if &entry.actor_id != a {
                    continue;
                }
            }
            if let Some(since) = q.since {
                if entry.timestamp < since {
                    continue;
                }
            }
            if let Some(until) = q.until {
                if entry.timestamp > until {
                    continue;
                }
            }
            matches.push(entry);
        }

        let limit = if q.limit == 0 { matches.len() } else { q.limit };
        Ok(matches.into_iter().skip(q.offset).take(limit).collect())
    }

    /// Export the full chain, ascending by id, as a JSON array.
    pub fn export(&self) -> Result<serde_json::Value, AuditLogError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (_, bytes) = item.map_err(|_| AuditLogError::Store)?;
            let entry: AuditEntry =
                decode_canonical_limited(&bytes, MAX_ENTRY_BYTES).map_err(|_| AuditLogError::Store)?;
            out.push(serde_json::to_value(&entry).map_err(|_| AuditLogError::Store)?);
        }
        Ok(serde_json::Value::Array(out))
    }

    /// Current chain length.
    pub fn len(&self) -> u64 {
        self.tail.lock().0
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn tamper(&self, id: u64, mutate: impl FnOnce(&mut AuditEntry)) {
        let mut entry = self.load(id).unwrap().unwrap();
        mutate(&mut entry);
        let bytes = encode_canonical(&entry).unwrap();
        self.tree.insert(id_key(id), bytes).unwrap();
    }
}
