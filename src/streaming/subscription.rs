// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Subscription lifecycle: `Create`/`Pause`/`Resume`/`Remove`.

use super::filter::FieldFilter;
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Subscription status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Actively receiving matching messages.
    Active,
    /// Temporarily suspended; matching messages are not delivered.
    Paused,
}

/// A subscription's filter configuration.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Schema names this subscription accepts, or `{"*"}` for all.
    pub data_types: BTreeSet<String>,
    /// Source peer ids this subscription accepts, or `{"all"}`.
    pub source_peers: BTreeSet<String>,
    /// Conjunctive field predicates.
    pub filters: Vec<FieldFilter>,
    /// Whether only encrypted messages should be delivered.
    pub encrypted: bool,
    /// Whether this subscription feeds a streaming (vs. single) session.
    pub streaming: bool,
    /// Per-second delivery rate limit.
    pub rate_limit: u32,
}

/// A live subscription.
#[derive(Clone, Debug)]
pub struct Subscription {
    /// `"sub_" || 16-byte hex`.
    pub id: String,
    /// Filter configuration.
    pub config: SubscriptionConfig,
    /// Current status.
    pub status: SubscriptionStatus,
    /// Number of messages delivered under this subscription so far.
    pub message_count: u64,
    /// Unix seconds this subscription was created.
    pub created_at: i64,
}

/// Subscription errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// `dataTypes` was empty.
    #[error("empty data types")]
    EmptyDataTypes,
    /// `dataTypes` named a schema the host doesn't recognize.
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
    /// No subscription with this id exists.
    #[error("subscription not found")]
    NotFound,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn new_subscription_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("sub_{}", hex::encode(bytes))
}

/// A function the host supplies to validate a schema name; returns
/// `true` if the schema is known. The core is itself schema-opaque.
pub type SchemaValidator = dyn Fn(&str) -> bool + Send + Sync;

/// In-memory subscription table.
pub struct SubscriptionStore {
    subscriptions: RwLock<BTreeMap<String, Subscription>>,
}

impl Default for SubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self { subscriptions: RwLock::new(BTreeMap::new()) }
    }

    /// Create a subscription. Fails (without mutating any state) if
    /// `dataTypes` is empty or names an unknown schema.
    pub fn create(
        &self,
        config: SubscriptionConfig,
        validate_schema: &SchemaValidator,
    ) -> Result<Subscription, SubscriptionError> {
        if config.data_types.is_empty() {
            return Err(SubscriptionError::EmptyDataTypes);
        }
        for schema in &config.data_types {
            if schema != "*" && !validate_schema(schema) {
                return Err(SubscriptionError::UnknownSchema(schema.clone()));
            }
        }

        let subscription = Subscription {
            id: new_subscription_id(),
            config,
            status: SubscriptionStatus::Active,
            message_count: 0,
            created_at: now_unix(),
        };
        self.subscriptions.write().insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    /// Pause a subscription.
    pub fn pause(&self, id: &str) -> Result<(), SubscriptionError> {
        let mut table = self.subscriptions.write();
        let sub = table.get_mut(id).ok_or(SubscriptionError::NotFound)?;
        sub.status = SubscriptionStatus::Paused;
        Ok(())
    }

    /// Resume a paused subscription.
    pub fn resume(&self, id: &str) -> Result<(), SubscriptionError> {
        let mut table = self.subscriptions.write();
        let sub = table.get_mut(id).ok_or(SubscriptionError::NotFound)?;
        sub.status = SubscriptionStatus::Active;
        Ok(())
    }

    /// Remove a subscription.
    pub fn remove(&self, id: &str) -> Result<(), SubscriptionError> {
        self.subscriptions.write().remove(id).ok_or(SubscriptionError::NotFound)?;
        Ok(())
    }

    /// Fetch a subscription by id.
    pub fn get(&self, id: &str) -> Option<Subscription> {
        self.subscriptions.read().get(id).cloned()
    }

    /// List every active subscription.
    pub fn active(&self) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .values()
            .filter(|s| s.status == SubscriptionStatus::Active)
            .cloned()
            .collect()
    }

    /// Increment a subscription's delivered-message counter.
    pub fn increment_message_count(&self, id: &str) {
        if let Some(sub) = self.subscriptions.write().get_mut(id) {
            sub.message_count += 1;
        }
    }

    /// `GetRequiredTopics`: one `/sdn/data/<schema>` per distinct schema
    /// across active subscriptions, plus one `/sdn/peer/<peerID>` per
    /// distinct non-`"all"` source peer.
    pub fn required_topics(&self) -> BTreeSet<String> {
        let mut topics = BTreeSet::new();
        for sub in self.active() {
            for schema in &sub.config.data_types {
                topics.insert(format!("/sdn/data/{}", strip_extension(schema)));
            }
            for peer in &sub.config.source_peers {
                if peer != "all" {
                    topics.insert(format!("/sdn/peer/{peer}"));
                }
            }
        }
        topics
    }
}

fn strip_extension(schema: &str) -> &str {
    match schema.rfind('.') {
        Some(idx) => &schema[..idx],
        None => schema,
    }
}
