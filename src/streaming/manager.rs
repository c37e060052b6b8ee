// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Session manager: owns the session map and per-peer index behind one
//! read-write lock (spec.md §5), and drives message fan-out to sessions
//! whose subscription accepts the inbound message.

use super::filter::evaluate_filters;
use super::session::{DeliveryMode, EncryptionMode, QueuedMessage, StreamingSession, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PER_PEER_SESSION_CAP};
use super::subscription::{SchemaValidator, Subscription, SubscriptionConfig, SubscriptionError, SubscriptionStore};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Streaming manager errors.
#[derive(Debug, Error)]
pub enum StreamingManagerError {
    /// The subscription a session was requested against doesn't exist.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    /// The peer already has `DEFAULT_PER_PEER_SESSION_CAP` (or configured cap) live sessions.
    #[error("peer session cap reached")]
    PeerSessionCapReached,
    /// No session with this id exists.
    #[error("session not found")]
    SessionNotFound,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

struct ManagerState {
    sessions: HashMap<String, StreamingSession>,
    by_peer: HashMap<String, BTreeSet<String>>,
    by_subscription: HashMap<String, Vec<String>>,
}

/// A single matched-and-delivered message handed to a `Single`-mode session.
/// Carries a snapshot of the session's identity rather than a live
/// reference, so the handler can run after the session-map lock is
/// released (spec.md §5: "No lock is held during handler invocation").
pub struct SingleDelivery<'a> {
    /// The id of the session that accepted it.
    pub session_id: &'a str,
    /// The peer the session delivers to.
    pub peer_id: &'a str,
    /// The message delivered.
    pub message: &'a QueuedMessage,
}

/// Owns subscriptions, sessions, and delivery fan-out.
pub struct StreamingManager {
    subscriptions: SubscriptionStore,
    state: RwLock<ManagerState>,
    per_peer_cap: usize,
    idle_timeout_secs: i64,
}

impl Default for StreamingManager {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PEER_SESSION_CAP, DEFAULT_IDLE_TIMEOUT_SECS)
    }
}

impl StreamingManager {
    /// Construct a manager with the given per-peer session cap and idle timeout.
    pub fn new(per_peer_cap: usize, idle_timeout_secs: i64) -> Self {
        Self {
            subscriptions: SubscriptionStore::new(),
            state: RwLock::new(ManagerState {
                sessions: HashMap::new(),
                by_peer: HashMap::new(),
                by_subscription: HashMap::new(),
            }),
            per_peer_cap,
            idle_timeout_secs,
        }
    }

    /// The subscription store (Create/Pause/Resume/Remove live here).
    pub fn subscriptions(&self) -> &SubscriptionStore {
        &self.subscriptions
    }

    /// Create a subscription (delegates to the subscription store).
    pub fn create_subscription(
        &self,
        config: SubscriptionConfig,
        validate_schema: &SchemaValidator,
    ) -> Result<Subscription, StreamingManagerError> {
        Ok(self.subscriptions.create(config, validate_schema)?)
    }

    /// Create a streaming session bound to `subscription_id`, enforcing
    /// the per-peer cap before any session state is allocated. For
    /// `Streaming`/`Batch` modes the caller must pass the returned
    /// receiver to [`Self::spawn_delivery`] to actually start delivering;
    /// `Single` mode returns `None` and needs no task.
    pub fn create_session(
        &self,
        subscription_id: &str,
        peer_id: &str,
        schema_types: Vec<String>,
        mode: DeliveryMode,
        encryption_mode: EncryptionMode,
    ) -> Result<(String, Option<mpsc::Receiver<QueuedMessage>>), StreamingManagerError> {
        {
            let state = self.state.read();
            let count = state.by_peer.get(peer_id).map(|s| s.len()).unwrap_or(0);
            if count >= self.per_peer_cap {
                return Err(StreamingManagerError::PeerSessionCapReached);
            }
        }

        let (session, rx) = StreamingSession::new(subscription_id, peer_id, schema_types, mode, encryption_mode);
        let id = session.id.clone();

        let mut state = self.state.write();
        let count = state.by_peer.get(peer_id).map(|s| s.len()).unwrap_or(0);
        if count >= self.per_peer_cap {
            return Err(StreamingManagerError::PeerSessionCapReached);
        }
        state.by_peer.entry(peer_id.to_string()).or_default().insert(id.clone());
        state.by_subscription.entry(subscription_id.to_string()).or_default().push(id.clone());
        state.sessions.insert(id.clone(), session);
        Ok((id, rx))
    }

    /// Close and remove a session, under the same write lock as the indices.
    pub fn close_session(&self, session_id: &str) -> Result<(), StreamingManagerError> {
        let mut state = self.state.write();
        self.remove_session_locked(&mut state, session_id)
    }

    fn remove_session_locked(&self, state: &mut ManagerState, session_id: &str) -> Result<(), StreamingManagerError> {
        let mut session = state.sessions.remove(session_id).ok_or(StreamingManagerError::SessionNotFound)?;
        session.close();
        if let Some(set) = state.by_peer.get_mut(&session.peer_id) {
            set.remove(session_id);
        }
        if let Some(list) = state.by_subscription.get_mut(&session.subscription_id) {
            list.retain(|id| id != session_id);
        }
        Ok(())
    }

    /// Process an inbound message: for every active subscription whose
    /// filters match, fan out to every session bound to it. Single-mode
    /// deliveries are returned synchronously via `on_single`; Streaming
    /// and Batch deliveries are enqueued non-blockingly (drop-on-full).
    ///
    /// The session-map write lock is held only long enough to mutate
    /// session counters and collect which sessions accepted the message;
    /// it is released before `on_single` runs, so a handler that
    /// re-enters the manager (e.g. `close_session`) cannot deadlock
    /// against it (spec.md §4.5/§5).
    pub fn process_message(
        &self,
        schema: &str,
        data: &serde_json::Value,
        raw: &[u8],
        from_peer: &str,
        encrypted: bool,
        mut on_single: impl FnMut(SingleDelivery<'_>),
    ) {
        for sub in self.subscriptions.active() {
            let schema_match = sub.config.data_types.contains("*") || sub.config.data_types.contains(schema);
            let peer_match = sub.config.source_peers.contains("all") || sub.config.source_peers.contains(from_peer);
            if !schema_match || !peer_match {
                continue;
            }
            if !evaluate_filters(&sub.config.filters, data) {
                continue;
            }

            self.subscriptions.increment_message_count(&sub.id);

            let message = QueuedMessage { schema: schema.to_string(), data: raw.to_vec() };
            let mut single_targets: Vec<(String, String)> = Vec::new();
            {
                let mut state = self.state.write();
                let Some(session_ids) = state.by_subscription.get(&sub.id).cloned() else { continue };
                for session_id in session_ids {
                    let Some(session) = state.sessions.get_mut(&session_id) else { continue };
                    if !session.accepts(schema, encrypted) {
                        continue;
                    }
                    match session.mode {
                        DeliveryMode::Single => {
                            session.record_single_delivery(message.data.len() as u64);
                            single_targets.push((session_id, session.peer_id.clone()));
                        }
                        DeliveryMode::Streaming | DeliveryMode::Batch { .. } => {
                            session.try_enqueue(message.clone());
                        }
                    }
                }
            } // write lock released before any handler runs

            for (session_id, peer_id) in &single_targets {
                on_single(SingleDelivery { session_id, peer_id, message: &message });
            }
        }
    }

    /// Spawn the dedicated delivery task for a `Streaming` or `Batch`
    /// session, consuming the receiver `create_session` returned for it.
    /// `Single`-mode sessions have no queue and need no task.
    ///
    /// `Streaming` reads the queue one message at a time and calls
    /// `handler(session_id, &[msg])` per message. `Batch` accumulates
    /// messages and calls `handler(session_id, &batch)` when the batch
    /// reaches `size`, when `interval_secs` has elapsed since the first
    /// message in the batch arrived, or when the session closes with a
    /// non-empty batch pending (explicit `close_session`, idle sweep, or
    /// the queue being dropped). The handler must return promptly; this
    /// loop does not enforce its own timeout (spec.md §5).
    pub fn spawn_delivery<F>(
        self: &Arc<Self>,
        session_id: String,
        rx: mpsc::Receiver<QueuedMessage>,
        mode: DeliveryMode,
        handler: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(&str, &[QueuedMessage]) + Send + 'static,
    {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let cancel_rx = {
                let state = manager.state.read();
                state.sessions.get(&session_id).map(|s| s.cancellation())
            };
            let Some(cancel_rx) = cancel_rx else { return };

            match mode {
                DeliveryMode::Single => {}
                DeliveryMode::Streaming => run_streaming_delivery(&session_id, rx, cancel_rx, handler).await,
                DeliveryMode::Batch { size, interval_secs } => {
                    run_batch_delivery(&session_id, rx, cancel_rx, size.max(1), interval_secs.max(1), handler).await
                }
            }

            let _ = manager.close_session(&session_id);
            debug!(session_id = %session_id, "streaming delivery task exited");
        })
    }

    /// `CleanupExpiredSessions`: remove every session idle longer than
    /// the configured timeout. Returns the count removed.
    pub fn cleanup_expired_sessions(&self) -> usize {
        let now = now_unix();
        let mut state = self.state.write();
        let expired: Vec<String> = state
            .sessions
            .values()
            .filter(|s| s.is_idle(self.idle_timeout_secs, now))
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            let _ = self.remove_session_locked(&mut state, id);
        }
        expired.len()
    }

    /// `GetRequiredTopics`, delegated to the subscription store.
    pub fn required_topics(&self) -> BTreeSet<String> {
        self.subscriptions.required_topics()
    }

    /// Number of live sessions for a peer.
    pub fn peer_session_count(&self, peer_id: &str) -> usize {
        self.state.read().by_peer.get(peer_id).map(|s| s.len()).unwrap_or(0)
    }
}

/// `Streaming` delivery loop: one message per `handler` call, until the
/// queue closes (sender side dropped) or the session is cancelled.
async fn run_streaming_delivery<F>(
    session_id: &str,
    mut rx: mpsc::Receiver<QueuedMessage>,
    mut cancel_rx: tokio::sync::watch::Receiver<bool>,
    mut handler: F,
) where
    F: FnMut(&str, &[QueuedMessage]) + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
            }
            msg = rx.recv() => {
                match msg {
                    Some(m) => handler(session_id, std::slice::from_ref(&m)),
                    None => break,
                }
            }
        }
    }
}

/// `Batch` delivery loop: accumulate messages and flush on `size`, on
/// `interval_secs` measured from the batch's first message, or when the
/// session closes (explicit `Close`, idle sweep) with a pending batch.
async fn run_batch_delivery<F>(
    session_id: &str,
    mut rx: mpsc::Receiver<QueuedMessage>,
    mut cancel_rx: tokio::sync::watch::Receiver<bool>,
    size: usize,
    interval_secs: u64,
    mut handler: F,
) where
    F: FnMut(&str, &[QueuedMessage]) + Send + 'static,
{
    let interval = std::time::Duration::from_secs(interval_secs);
    let mut batch: Vec<QueuedMessage> = Vec::with_capacity(size);
    let mut deadline: Option<tokio::time::Instant> = None;

    loop {
        let sleep_until_deadline = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    if !batch.is_empty() {
                        handler(session_id, &batch);
                    }
                    break;
                }
            }
            msg = rx.recv() => {
                match msg {
                    Some(m) => {
                        if batch.is_empty() {
                            deadline = Some(tokio::time::Instant::now() + interval);
                        }
                        batch.push(m);
                        if batch.len() >= size {
                            handler(session_id, &batch);
                            batch.clear();
                            deadline = None;
                        }
                    }
                    None => {
                        if !batch.is_empty() {
                            handler(session_id, &batch);
                        }
                        break;
                    }
                }
            }
            _ = sleep_until_deadline => {
                if !batch.is_empty() {
                    handler(session_id, &batch);
                    batch.clear();
                }
                deadline = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet as BSet;

    fn always_valid(_: &str) -> bool {
        true
    }

    fn sub_config() -> SubscriptionConfig {
        SubscriptionConfig {
            data_types: BSet::from(["conjunction".to_string()]),
            source_peers: BSet::from(["all".to_string()]),
            filters: Vec::new(),
            encrypted: false,
            streaming: true,
            rate_limit: 10,
        }
    }

    #[test]
    fn per_peer_cap_is_enforced_pre_allocation() {
        let manager = StreamingManager::new(1, DEFAULT_IDLE_TIMEOUT_SECS);
        let sub = manager.create_subscription(sub_config(), &always_valid).unwrap();
        manager
            .create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], DeliveryMode::Streaming, EncryptionMode::None)
            .unwrap();
        let err = manager
            .create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], DeliveryMode::Streaming, EncryptionMode::None)
            .unwrap_err();
        assert!(matches!(err, StreamingManagerError::PeerSessionCapReached));
    }

    #[test]
    fn process_message_delivers_to_matching_single_session() {
        let manager = StreamingManager::default();
        let sub = manager.create_subscription(sub_config(), &always_valid).unwrap();
        let (session_id, _rx) = manager
            .create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], DeliveryMode::Single, EncryptionMode::None)
            .unwrap();

        let mut delivered = 0;
        manager.process_message(
            "conjunction",
            &serde_json::json!({}),
            b"payload",
            "peer-2",
            false,
            |_d| delivered += 1,
        );
        assert_eq!(delivered, 1);
        assert_eq!(manager.subscriptions().get(&sub.id).unwrap().message_count, 1);
        let _ = session_id;
    }

    #[test]
    fn cleanup_removes_idle_sessions() {
        let manager = StreamingManager::new(DEFAULT_PER_PEER_SESSION_CAP, -1); // everything idle immediately
        let sub = manager.create_subscription(sub_config(), &always_valid).unwrap();
        manager
            .create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], DeliveryMode::Streaming, EncryptionMode::None)
            .unwrap();
        assert_eq!(manager.cleanup_expired_sessions(), 1);
        assert_eq!(manager.peer_session_count("peer-1"), 0);
    }

    #[test]
    fn single_mode_handler_can_reenter_manager_without_deadlock() {
        let manager = StreamingManager::default();
        let sub = manager.create_subscription(sub_config(), &always_valid).unwrap();
        let (session_id, _rx) = manager
            .create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], DeliveryMode::Single, EncryptionMode::None)
            .unwrap();

        // If process_message held the session-map lock across the handler
        // call, this would deadlock against itself instead of returning.
        manager.process_message("conjunction", &serde_json::json!({}), b"payload", "peer-2", false, |_d| {
            let _ = manager.close_session(&session_id);
        });

        assert_eq!(manager.peer_session_count("peer-1"), 0);
    }

    #[tokio::test]
    async fn streaming_delivery_task_delivers_one_message_at_a_time() {
        let manager = Arc::new(StreamingManager::default());
        let sub = manager.create_subscription(sub_config(), &always_valid).unwrap();
        let (session_id, rx) = manager
            .create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], DeliveryMode::Streaming, EncryptionMode::None)
            .unwrap();
        let rx = rx.expect("streaming session owns a queue");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<usize>();
        let handle = manager.spawn_delivery(session_id.clone(), rx, DeliveryMode::Streaming, move |_id, batch| {
            let _ = out_tx.send(batch.len());
        });

        for _ in 0..3 {
            manager.process_message("conjunction", &serde_json::json!({}), b"m", "peer-2", false, |_| {});
        }

        for _ in 0..3 {
            let len = tokio::time::timeout(std::time::Duration::from_secs(1), out_rx.recv()).await.unwrap().unwrap();
            assert_eq!(len, 1, "streaming mode must deliver one message per handler call");
        }

        let _ = manager.close_session(&session_id);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn batch_delivery_flushes_on_size() {
        let manager = Arc::new(StreamingManager::default());
        let sub = manager.create_subscription(sub_config(), &always_valid).unwrap();
        let mode = DeliveryMode::Batch { size: 2, interval_secs: 30 };
        let (session_id, rx) = manager.create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], mode, EncryptionMode::None).unwrap();
        let rx = rx.expect("batch session owns a queue");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<usize>();
        let handle = manager.spawn_delivery(session_id.clone(), rx, mode, move |_id, batch| {
            let _ = out_tx.send(batch.len());
        });

        for _ in 0..2 {
            manager.process_message("conjunction", &serde_json::json!({}), b"m", "peer-2", false, |_| {});
        }

        let len = tokio::time::timeout(std::time::Duration::from_secs(1), out_rx.recv()).await.unwrap().unwrap();
        assert_eq!(len, 2, "batch must flush as soon as it reaches its configured size");

        let _ = manager.close_session(&session_id);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn batch_delivery_flushes_on_interval_even_when_under_size() {
        let manager = Arc::new(StreamingManager::default());
        let sub = manager.create_subscription(sub_config(), &always_valid).unwrap();
        let mode = DeliveryMode::Batch { size: 100, interval_secs: 1 };
        let (session_id, rx) = manager.create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], mode, EncryptionMode::None).unwrap();
        let rx = rx.expect("batch session owns a queue");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<usize>();
        let handle = manager.spawn_delivery(session_id.clone(), rx, mode, move |_id, batch| {
            let _ = out_tx.send(batch.len());
        });

        manager.process_message("conjunction", &serde_json::json!({}), b"m", "peer-2", false, |_| {});

        // S5: a batch under its size limit still flushes once BatchInterval elapses.
        let len = tokio::time::timeout(std::time::Duration::from_secs(3), out_rx.recv()).await.unwrap().unwrap();
        assert_eq!(len, 1);

        let _ = manager.close_session(&session_id);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn batch_flushes_pending_messages_on_session_close() {
        let manager = Arc::new(StreamingManager::default());
        let sub = manager.create_subscription(sub_config(), &always_valid).unwrap();
        let mode = DeliveryMode::Batch { size: 100, interval_secs: 30 };
        let (session_id, rx) = manager.create_session(&sub.id, "peer-1", vec!["conjunction".to_string()], mode, EncryptionMode::None).unwrap();
        let rx = rx.expect("batch session owns a queue");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<usize>();
        let handle = manager.spawn_delivery(session_id.clone(), rx, mode, move |_id, batch| {
            let _ = out_tx.send(batch.len());
        });

        manager.process_message("conjunction", &serde_json::json!({}), b"m", "peer-2", false, |_| {});
        let _ = manager.close_session(&session_id);

        let len = tokio::time::timeout(std::time::Duration::from_secs(1), out_rx.recv()).await.unwrap().unwrap();
        assert_eq!(len, 1, "an explicit close must flush whatever batch was pending");

        let _ = handle.await;
    }
}
