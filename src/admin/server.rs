// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Compose the auth and plugin routers with ambient ops endpoints.
//!
//! Capability-token issuance (payment, licensing) is an external
//! collaborator per spec.md's scope boundary; `SessionCapabilityVerifier`
//! is the default binding used when no other issuer is configured — it
//! treats an authenticated SDN session as proof of the base plugin scope.

use crate::auth::routes::AuthState;
use crate::monitoring::metrics::Metrics;
use crate::plugins::envelope::CapabilityClaims;
use crate::plugins::routes::{CapabilityVerifier, PluginState};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Default capability check: a valid, unexpired SDN session (Bearer
/// token = session cookie value) grants the base plugin scope.
pub struct SessionCapabilityVerifier {
    auth: Arc<AuthState>,
    scope: String,
}

impl SessionCapabilityVerifier {
    /// Build a verifier sharing the given auth state's session table.
    /// `scope` is the plugin scope every authenticated session is
    /// treated as holding.
    pub fn new(auth: Arc<AuthState>, scope: impl Into<String>) -> Self {
        Self { auth, scope: scope.into() }
    }
}

impl CapabilityVerifier for SessionCapabilityVerifier {
    fn verify(&self, headers: &HeaderMap) -> Option<CapabilityClaims> {
        let authz = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
        let token = authz.strip_prefix("Bearer ")?;
        let session = self.auth.sessions.get(token).ok()?;
        Some(CapabilityClaims {
            sub: session.xpub.clone(),
            peer_id: session.xpub,
            jti: Uuid::new_v4().to_string(),
            scope: self.scope.clone(),
            exp: session.expires_at,
        })
    }
}

/// A capability check that grants the configured scope to every request,
/// unconditionally. Only appropriate for `admin.require_auth = false`
/// deployments on a trusted/closed network — never the default.
pub struct AllowAllCapabilityVerifier {
    scope: String,
}

impl AllowAllCapabilityVerifier {
    /// Build a verifier that grants `scope` to any request.
    pub fn new(scope: impl Into<String>) -> Self {
        Self { scope: scope.into() }
    }
}

impl CapabilityVerifier for AllowAllCapabilityVerifier {
    fn verify(&self, _headers: &HeaderMap) -> Option<CapabilityClaims> {
        let exp = (chrono::Utc::now() + chrono::Duration::seconds(120)).timestamp();
        Some(CapabilityClaims {
            sub: "anonymous".to_string(),
            peer_id: "anonymous".to_string(),
            jti: Uuid::new_v4().to_string(),
            scope: self.scope.clone(),
            exp,
        })
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<Arc<Metrics>>,
) -> impl IntoResponse {
    let families = metrics.registry.gather();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new());
    }
    (StatusCode::OK, buf)
}

/// Build the full admin `Router`: `/auth/*`, `/plugins/*`, `/healthz`,
/// and `/metrics`. `/healthz` and `/metrics` are never gated — they are
/// ambient ops surfaces, not part of the authenticated API (§2).
pub fn build_router(
    auth_state: Arc<AuthState>,
    plugin_state: Arc<PluginState>,
    metrics: Arc<Metrics>,
) -> Router {
    Router::new()
        .merge(crate::auth::routes::router(auth_state))
        .merge(crate::plugins::routes::router(plugin_state))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler).with_state(metrics))
        .layer(TraceLayer::new_for_http())
}
