// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! `POST /auth/challenge`, `POST /auth/verify`, `POST /auth/logout`, and
//! `GET /auth/me` — the external HTTP surface of session authentication (C3).

use super::{ChallengeStore, SessionStore};
use crate::audit::{event_types, AuditLog, Severity};
use crate::identity::{keystore::KeyManager, xpub};
use crate::trust::TrustRegistry;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

const SESSION_COOKIE: &str = "sdn_session";

/// Shared state the auth routes need. Deliberately separate from the
/// rest of the admin server's state so these routes are independently
/// testable and mountable.
pub struct AuthState {
    /// Short-lived, single-use login challenges.
    pub challenges: ChallengeStore,
    /// Live cookie sessions.
    pub sessions: SessionStore,
    /// The peer/identity trust directory; also the "known user" check for C3.
    pub trust: Arc<TrustRegistry>,
    /// The hash-linked audit log.
    pub audit: Arc<AuditLog>,
    /// Whether the admin listener is serving over TLS (controls `Secure` cookies).
    pub tls: bool,
}

/// The stable, machine-readable error envelope returned by every auth route.
#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { code: self.code, message: self.message })).into_response()
    }
}

fn bad_request(code: &'static str, message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, code, message)
}

#[derive(Deserialize)]
struct ChallengeRequest {
    xpub: String,
    #[serde(rename = "clientPublicKey")]
    client_public_key: String,
    /// Client-supplied Unix-seconds timestamp; must be within 2 minutes
    /// of the server's clock (spec.md §4.3).
    ts: i64,
}

const CHALLENGE_TS_SKEW_SECS: i64 = 120;

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[derive(Serialize)]
struct ChallengeResponse {
    #[serde(rename = "challengeId")]
    challenge_id: String,
    #[serde(rename = "challengeBytes")]
    challenge_bytes: String,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

fn decode_base64_32(s: &str) -> Result<[u8; 32], ApiError> {
    let bytes = STANDARD
        .decode(s)
        .map_err(|_| bad_request("invalid_public_key", "clientPublicKey is not valid base64"))?;
    bytes
        .try_into()
        .map_err(|_| bad_request("invalid_public_key", "clientPublicKey must decode to 32 bytes"))
}

/// `POST /auth/challenge`: issue a single-use challenge bound to an xpub
/// the caller claims to control. The xpub must already be known to the
/// trust registry (I2) or the request is rejected as `unknown_user`.
async fn post_challenge(
    State(state): State<Arc<AuthState>>,
    Json(req): Json<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    xpub::parse(&req.xpub).map_err(|_| bad_request("invalid_public_key", "xpub does not parse"))?;
    let client_public_key = decode_base64_32(&req.client_public_key)?;

    if (now_unix() - req.ts).abs() > CHALLENGE_TS_SKEW_SECS {
        return Err(bad_request("invalid_timestamp", "ts is too far from the server clock"));
    }

    let known = state
        .trust
        .get(&req.xpub)
        .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "invalid_request", "trust store unavailable"))?;
    if known.is_none() {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "unknown_user", "xpub has no trust registry entry"));
    }

    let challenge = state.challenges.create(&req.xpub, client_public_key);
    Ok(Json(ChallengeResponse {
        challenge_id: challenge.id,
        challenge_bytes: STANDARD.encode(challenge.challenge_bytes),
        expires_at: challenge.expires_at,
    }))
}

#[derive(Deserialize)]
struct VerifyRequest {
    #[serde(rename = "challengeId")]
    challenge_id: String,
    xpub: String,
    signature: String,
}

#[derive(Serialize)]
struct VerifyResponse {
    xpub: String,
    #[serde(rename = "trustLevel")]
    trust_level: String,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

fn trust_level_str(level: crate::trust::TrustLevel) -> &'static str {
    use crate::trust::TrustLevel::*;
    match level {
        Untrusted => "untrusted",
        Limited => "limited",
        Standard => "standard",
        Trusted => "trusted",
        Admin => "admin",
    }
}

/// `POST /auth/verify`: consume the challenge and verify the client's
/// Ed25519 signature over `challengeBytes`, issuing a cookie session on
/// success. Records `admin.login` to the audit log (spec.md §8, S1).
async fn post_verify(
    State(state): State<Arc<AuthState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    jar: CookieJar,
    Json(req): Json<VerifyRequest>,
) -> Result<(CookieJar, Json<VerifyResponse>), ApiError> {
    let parsed_xpub = xpub::parse(&req.xpub).map_err(|_| bad_request("invalid_public_key", "xpub does not parse"))?;

    let signature_bytes: [u8; 64] = STANDARD
        .decode(&req.signature)
        .map_err(|_| bad_request("invalid_request", "signature is not valid base64"))?
        .try_into()
        .map_err(|_| bad_request("invalid_request", "signature must be 64 bytes"))?;

    let challenge = state
        .challenges
        .take_for_xpub(&req.challenge_id, &req.xpub)
        .map_err(map_challenge_error)?;

    if !KeyManager::verify(&parsed_xpub.public_key, &challenge.challenge_bytes, &signature_bytes) {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "signature_invalid", "signature does not verify"));
    }

    let client_ip = addr.ip().to_string();
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let trust_level = state
        .trust
        .classify(&req.xpub)
        .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "invalid_request", "trust store unavailable"))?;

    let session = state.sessions.create(&req.xpub, trust_level, &client_ip, &user_agent);

    let _ = state.audit.append(
        event_types::ADMIN_LOGIN,
        Severity::Info,
        &req.xpub,
        &client_ip,
        "session",
        &session.token,
        "admin login via challenge/response",
        "{}",
    );

    let mut cookie = Cookie::new(SESSION_COOKIE, session.token.clone());
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_secure(state.tls);
    cookie.set_path("/");

    Ok((
        jar.add(cookie),
        Json(VerifyResponse {
            xpub: req.xpub,
            trust_level: trust_level_str(trust_level).to_string(),
            expires_at: session.expires_at,
        }),
    ))
}

fn map_challenge_error(e: super::ChallengeError) -> ApiError {
    use super::ChallengeError::*;
    match e {
        NotFound => ApiError::new(StatusCode::BAD_REQUEST, "challenge_not_found", "no such challenge"),
        Expired => ApiError::new(StatusCode::BAD_REQUEST, "challenge_expired", "challenge has expired"),
        Mismatch => ApiError::new(StatusCode::BAD_REQUEST, "challenge_mismatch", "challenge does not match xpub"),
    }
}

#[derive(Serialize)]
struct MeResponse {
    xpub: String,
    #[serde(rename = "trustLevel")]
    trust_level: String,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

/// `GET /auth/me`: resolve the calling session's cookie to its identity.
async fn get_me(State(state): State<Arc<AuthState>>, jar: CookieJar) -> Result<Json<MeResponse>, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "no session cookie"))?;

    let session = state
        .sessions
        .get(&token)
        .map_err(|_| ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "session not found or expired"))?;

    Ok(Json(MeResponse {
        xpub: session.xpub,
        trust_level: trust_level_str(session.trust_level).to_string(),
        expires_at: session.expires_at,
    }))
}

/// Response body for a successful logout.
#[derive(Serialize)]
struct LogoutResponse {
    status: &'static str,
}

/// `POST /auth/logout`: revoke the calling session's cookie (idempotent).
async fn post_logout(
    State(state): State<Arc<AuthState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let token = cookie.value().to_string();
        if let Ok(session) = state.sessions.get(&token) {
            state.sessions.revoke(&token);
            let _ = state.audit.append(
                event_types::ADMIN_LOGOUT,
                Severity::Info,
                &session.xpub,
                &addr.ip().to_string(),
                "session",
                &token,
                "session revoked via logout",
                "{}",
            );
        }
    }
    (jar.remove(Cookie::from(SESSION_COOKIE)), Json(LogoutResponse { status: "logged_out" }))
}

/// Build the `/auth/*` router, mountable standalone or nested under an
/// admin server composition root.
pub fn router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/auth/challenge", post(post_challenge))
        .route("/auth/verify", post(post_verify))
        .route("/auth/logout", post(post_logout))
        .route("/auth/me", get(get_me))
        .with_state(state)
}
