// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Prometheus metrics registry, generalized from the teacher's
//! consensus-flavored gauges to the SDN surface (streaming sessions,
//! audit chain, auth, and plugin envelopes) alongside the unchanged
//! P2P transport series.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric failed to construct or register.
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Connected P2P peers gauge.
    pub p2p_peers: IntGauge,
    /// Invalid decoded P2P messages.
    pub p2p_invalid_msg_total: IntCounter,
    /// Messages dropped for arriving from a non-allowlisted peer.
    pub p2p_banned_total: IntCounter,

    /// Currently active streaming sessions (C5).
    pub streaming_sessions_active: IntGauge,
    /// Messages handed to a session's delivery handler.
    pub streaming_messages_delivered_total: IntCounter,
    /// Messages dropped on a full session queue.
    pub streaming_queue_dropped_total: IntCounter,
    /// Sessions swept for exceeding the idle timeout.
    pub streaming_sessions_expired_total: IntCounter,

    /// Login challenges issued (C3).
    pub auth_challenges_issued_total: IntCounter,
    /// Successful challenge/response verifications.
    pub auth_logins_total: IntCounter,
    /// Rejected verification attempts (expired, mismatched, or bad signature).
    pub auth_failures_total: IntCounter,

    /// Requests denied by the trust-scaled rate limiter (C4).
    pub trust_rate_limited_total: IntCounter,

    /// Entries appended to the audit chain (C7).
    pub audit_entries_total: IntCounter,

    /// Plugin key envelopes issued (C8).
    pub plugin_envelopes_issued_total: IntCounter,
}

fn counter(name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    IntCounter::new(name, help).map_err(|_| MetricsError::Prom)
}

fn gauge(name: &str, help: &str) -> Result<IntGauge, MetricsError> {
    IntGauge::new(name, help).map_err(|_| MetricsError::Prom)
}

impl Metrics {
    /// Create and register every metric against a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let p2p_peers = gauge("sdn_p2p_peers", "Connected P2P peers")?;
        let p2p_invalid_msg_total = counter("sdn_p2p_invalid_msg_total", "Invalid decoded P2P messages")?;
        let p2p_banned_total = counter("sdn_p2p_banned_total", "Messages dropped from non-allowlisted peers")?;

        let streaming_sessions_active = gauge("sdn_streaming_sessions_active", "Active streaming sessions")?;
        let streaming_messages_delivered_total =
            counter("sdn_streaming_messages_delivered_total", "Messages delivered to session handlers")?;
        let streaming_queue_dropped_total =
            counter("sdn_streaming_queue_dropped_total", "Messages dropped on a full session queue")?;
        let streaming_sessions_expired_total =
            counter("sdn_streaming_sessions_expired_total", "Sessions swept for idle timeout")?;

        let auth_challenges_issued_total = counter("sdn_auth_challenges_issued_total", "Login challenges issued")?;
        let auth_logins_total = counter("sdn_auth_logins_total", "Successful challenge/response logins")?;
        let auth_failures_total = counter("sdn_auth_failures_total", "Rejected verification attempts")?;

        let trust_rate_limited_total =
            counter("sdn_trust_rate_limited_total", "Requests denied by the trust-scaled rate limiter")?;

        let audit_entries_total = counter("sdn_audit_entries_total", "Entries appended to the audit chain")?;

        let plugin_envelopes_issued_total =
            counter("sdn_plugin_envelopes_issued_total", "Plugin key envelopes issued")?;

        for metric in [&p2p_invalid_msg_total, &p2p_banned_total] as [&IntCounter; 2] {
            registry.register(Box::new(metric.clone())).map_err(|_| MetricsError::Prom)?;
        }
        registry.register(Box::new(p2p_peers.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(streaming_sessions_active.clone())).map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(streaming_messages_delivered_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(streaming_queue_dropped_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(streaming_sessions_expired_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(auth_challenges_issued_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(auth_logins_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(auth_failures_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(trust_rate_limited_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(audit_entries_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(plugin_envelopes_issued_total.clone())).map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            p2p_peers,
            p2p_invalid_msg_total,
            p2p_banned_total,
            streaming_sessions_active,
            streaming_messages_delivered_total,
            streaming_queue_dropped_total,
            streaming_sessions_expired_total,
            auth_challenges_issued_total,
            auth_logins_total,
            auth_failures_total,
            trust_rate_limited_total,
            audit_entries_total,
            plugin_envelopes_issued_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_metric_registers_without_collision() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry.gather().is_empty());
    }
}
