// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! `GET /plugins/manifest`, `GET /plugins/{id}/bundle`, and
//! `POST /plugins/{id}/key-envelope`.

use super::catalog::PluginCatalog;
use super::envelope::{build, CapabilityClaims, EnvelopeBuildError};
use super::key::parse_plugin_key;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Verifies a capability token carried on the request and returns the
/// claims it grants. Token issuance/verification lives outside this
/// crate (spec's payment/license-issuance surfaces are explicitly
/// external); the host supplies this as an injected collaborator.
pub trait CapabilityVerifier: Send + Sync {
    /// Verify the bearer token in `headers`, returning its claims.
    fn verify(&self, headers: &HeaderMap) -> Option<CapabilityClaims>;
}

/// Shared state for the plugin routes.
pub struct PluginState {
    /// The loaded, checksummed plugin catalog.
    pub catalog: PluginCatalog,
    /// Recorded as `iss=` in every envelope's associated data.
    pub issuer: String,
    /// Capability token verification, injected by the host.
    pub capability_verifier: Box<dyn CapabilityVerifier>,
}

#[derive(Serialize)]
struct ManifestEntry {
    id: String,
    version: String,
    required_scope: String,
    content_type: String,
    cache_control: String,
    bundle_sha256: String,
    size_bytes: u64,
}

/// `GET /plugins/manifest`.
async fn get_manifest(State(state): State<Arc<PluginState>>) -> Json<Vec<ManifestEntry>> {
    Json(
        state
            .catalog
            .manifest()
            .into_iter()
            .map(|a| ManifestEntry {
                id: a.id.clone(),
                version: a.version.clone(),
                required_scope: a.required_scope.clone(),
                content_type: a.content_type.clone(),
                cache_control: a.cache_control.clone(),
                bundle_sha256: a.bundle_sha256.clone(),
                size_bytes: a.size_bytes,
            })
            .collect(),
    )
}

/// `GET /plugins/{id}/bundle`.
async fn get_bundle(State(state): State<Arc<PluginState>>, AxumPath(id): AxumPath<String>) -> Response {
    let Some(asset) = state.catalog.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match state.catalog.read_bundle_verified(asset) {
        Ok(bytes) => {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, asset.content_type.parse().unwrap());
            headers.insert(header::CACHE_CONTROL, asset.cache_control.parse().unwrap());
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[derive(Deserialize)]
struct KeyEnvelopeRequest {
    client_x25519_pubkey: String,
}

#[derive(Serialize)]
struct KeyEnvelopeResponse {
    #[serde(rename = "pluginId")]
    plugin_id: String,
    version: String,
    #[serde(rename = "requiredScope")]
    required_scope: String,
    #[serde(rename = "bundleSHA256")]
    bundle_sha256: String,
    alg: &'static str,
    #[serde(rename = "serverX25519Pub")]
    server_x25519_pub: String,
    nonce: String,
    ciphertext: String,
    #[serde(rename = "associatedData")]
    associated_data: String,
    issuer: String,
    subject: String,
    #[serde(rename = "peerID")]
    peer_id: String,
    #[serde(rename = "capabilityTokenJTI")]
    capability_token_jti: String,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

/// `POST /plugins/{id}/key-envelope`.
async fn post_key_envelope(
    State(state): State<Arc<PluginState>>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    Json(req): Json<KeyEnvelopeRequest>,
) -> Response {
    let Some(claims) = state.capability_verifier.verify(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let Some(asset) = state.catalog.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if claims.scope != asset.required_scope {
        return StatusCode::FORBIDDEN.into_response();
    }

    let Ok(client_pub_bytes) = STANDARD.decode(&req.client_x25519_pubkey) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Ok(client_pub): Result<[u8; 32], _> = client_pub_bytes.try_into() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let key_bytes = match std::fs::read(&asset.key_path) {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    let Ok(plugin_key) = parse_plugin_key(&key_bytes) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let envelope = match build(asset, &plugin_key, &client_pub, &claims, &state.issuer, now_unix()) {
        Ok(e) => e,
        Err(EnvelopeBuildError::AlreadyExpired) => return StatusCode::FORBIDDEN.into_response(),
        Err(EnvelopeBuildError::Seal) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    Json(KeyEnvelopeResponse {
        plugin_id: envelope.plugin_id,
        version: envelope.version,
        required_scope: envelope.required_scope,
        bundle_sha256: envelope.bundle_sha256,
        alg: envelope.alg,
        server_x25519_pub: STANDARD.encode(envelope.server_x25519_pub),
        nonce: STANDARD.encode(envelope.nonce),
        ciphertext: STANDARD.encode(envelope.ciphertext),
        associated_data: envelope.associated_data,
        issuer: envelope.issuer,
        subject: envelope.subject,
        peer_id: envelope.peer_id,
        capability_token_jti: envelope.capability_token_jti,
        expires_at: envelope.expires_at,
    })
    .into_response()
}

/// Build the `/plugins/*` router, mountable standalone or nested under
/// an admin server composition root.
pub fn router(state: Arc<PluginState>) -> Router {
    Router::new()
        .route("/plugins/manifest", get(get_manifest))
        .route("/plugins/:id/bundle", get(get_bundle))
        .route("/plugins/:id/key-envelope", post(post_key_envelope))
        .with_state(state)
}
