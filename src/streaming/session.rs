// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! A streaming session: a subscription's delivery target for one peer,
//! in Single, Streaming, or Batch mode.

use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Default bounded queue depth for Streaming/Batch sessions.
pub const DEFAULT_QUEUE_DEPTH: usize = 1_000;
/// Default batch flush size.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default batch flush interval.
pub const DEFAULT_BATCH_INTERVAL_SECS: u64 = 5;
/// Default idle timeout before a session is swept.
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 5 * 60;
/// Default per-peer concurrent session cap.
pub const DEFAULT_PER_PEER_SESSION_CAP: usize = 10;

/// Delivery mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Synchronous delivery on the inbound path; explicit `Close` only.
    Single,
    /// Dedicated task reading a bounded queue, one message at a time.
    Streaming,
    /// Dedicated task accumulating a batch before flushing.
    Batch {
        /// Flush size.
        size: usize,
        /// Flush interval.
        interval_secs: u64,
    },
}

/// Per-session encryption mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncryptionMode {
    /// Messages are delivered as received.
    None,
    /// Out-of-band session key; only `encrypted == true` messages are delivered.
    SessionKey,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("sess_{}", hex::encode(bytes))
}

/// A queued message, handed to a session's delivery task.
#[derive(Clone, Debug)]
pub struct QueuedMessage {
    /// The schema this message claims to be.
    pub schema: String,
    /// Raw payload bytes (already filtered for this session).
    pub data: Vec<u8>,
}

/// A streaming session: delivery state for one subscription/peer pair.
pub struct StreamingSession {
    /// `"sess_" || 16-byte hex`.
    pub id: String,
    /// The subscription this session was created for.
    pub subscription_id: String,
    /// The peer this session delivers to.
    pub peer_id: String,
    /// Schema names this session accepts.
    pub schema_types: Vec<String>,
    /// Delivery mode.
    pub mode: DeliveryMode,
    /// Encryption mode.
    pub encryption_mode: EncryptionMode,
    /// Present only under `EncryptionMode::SessionKey`.
    pub session_key_id: Option<[u8; 16]>,
    /// Unix seconds this session was created.
    pub created_at: i64,
    /// Unix seconds of the last message enqueued.
    pub last_activity: i64,
    /// Monotone non-decreasing count of messages handed to the delivery handler.
    pub messages_sent: u64,
    /// Monotone non-decreasing count of bytes handed to the delivery handler.
    pub bytes_sent: u64,
    /// Whether the session is still accepting deliveries.
    pub active: bool,

    queue_tx: Option<mpsc::Sender<QueuedMessage>>,
    cancel_tx: watch::Sender<bool>,
}

impl StreamingSession {
    /// Construct a new session. `Single` mode sessions carry no queue
    /// (delivery is synchronous on the inbound path); `Streaming` and
    /// `Batch` sessions get a bounded channel a delivery task reads.
    pub fn new(
        subscription_id: &str,
        peer_id: &str,
        schema_types: Vec<String>,
        mode: DeliveryMode,
        encryption_mode: EncryptionMode,
    ) -> (Self, Option<mpsc::Receiver<QueuedMessage>>) {
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let now = now_unix();
        let session_key_id = if encryption_mode == EncryptionMode::SessionKey {
            let mut id = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut id);
            Some(id)
        } else {
            None
        };

        let (queue_tx, queue_rx) = match mode {
            DeliveryMode::Single => (None, None),
            _ => {
                let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_DEPTH);
                (Some(tx), Some(rx))
            }
        };

        let session = Self {
            id: new_session_id(),
            subscription_id: subscription_id.to_string(),
            peer_id: peer_id.to_string(),
            schema_types,
            mode,
            encryption_mode,
            session_key_id,
            created_at: now,
            last_activity: now,
            messages_sent: 0,
            bytes_sent: 0,
            active: true,
            queue_tx,
            cancel_tx,
        };
        (session, queue_rx)
    }

    /// Whether this session accepts a message with the given schema and
    /// the `encrypted` flag from its routing header — encryption-mode
    /// mismatches are a filter, not an error.
    pub fn accepts(&self, schema: &str, encrypted: bool) -> bool {
        let schema_ok = self.schema_types.iter().any(|s| s == "*" || s == schema);
        let encryption_ok = match self.encryption_mode {
            EncryptionMode::None => true,
            EncryptionMode::SessionKey => encrypted,
        };
        schema_ok && encryption_ok
    }

    /// Non-blocking enqueue for Streaming/Batch sessions. Returns `false`
    /// (queue full, message dropped) without blocking the caller. A full
    /// queue logs a single warning per drop rather than failing silently
    /// or blocking the inbound path.
    pub fn try_enqueue(&mut self, msg: QueuedMessage) -> bool {
        let Some(tx) = &self.queue_tx else { return false };
        let bytes = msg.data.len() as u64;
        match tx.try_send(msg) {
            Ok(()) => {
                self.last_activity = now_unix();
                self.messages_sent += 1;
                self.bytes_sent += bytes;
                true
            }
            Err(_) => {
                warn!(session_id = %self.id, peer_id = %self.peer_id, "streaming session queue full, message dropped");
                false
            }
        }
    }

    /// Record a synchronous (Single-mode) delivery.
    pub fn record_single_delivery(&mut self, bytes: u64) {
        self.last_activity = now_unix();
        self.messages_sent += 1;
        self.bytes_sent += bytes;
    }

    /// Whether this session has been idle longer than `timeout_secs`.
    pub fn is_idle(&self, timeout_secs: i64, now: i64) -> bool {
        now - self.last_activity > timeout_secs
    }

    /// Idempotent cancellation handle.
    pub fn close(&mut self) {
        self.active = false;
        let _ = self.cancel_tx.send(true);
    }

    /// A receiver that resolves when [`Self::close`] is called.
    pub fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }
}
