// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Per-request AEAD wrap of a plugin's bundle key to a client's ephemeral
//! X25519 key, bound to a capability claim (§4.8).

use super::catalog::PluginAsset;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const ALGORITHM: &str = "X25519+SHA256+AES-256-GCM";
const MAX_ENVELOPE_LIFETIME_SECS: i64 = 120;

/// The capability claim a request presents, verified by the host before
/// `build` is called — verification itself is an injected collaborator,
/// not this crate's concern (spec's payment/license-issuance surfaces
/// are explicitly external).
#[derive(Clone, Debug)]
pub struct CapabilityClaims {
    /// The capability token's subject.
    pub sub: String,
    /// The requesting peer's id.
    pub peer_id: String,
    /// The capability token's unique id (for replay bookkeeping by the host).
    pub jti: String,
    /// The scope the capability token grants.
    pub scope: String,
    /// The capability token's own expiry, Unix seconds.
    pub exp: i64,
}

/// A built plugin key envelope.
#[derive(Clone, Debug)]
pub struct PluginEnvelope {
    /// The plugin this envelope's key belongs to.
    pub plugin_id: String,
    /// The plugin version this envelope's key belongs to.
    pub version: String,
    /// The scope required to fetch the underlying bundle.
    pub required_scope: String,
    /// The bundle's SHA-256, at load time.
    pub bundle_sha256: String,
    /// Fixed algorithm tag.
    pub alg: &'static str,
    /// The server's fresh ephemeral X25519 public key for this request.
    pub server_x25519_pub: [u8; 32],
    /// 12-byte AES-GCM nonce.
    pub nonce: [u8; 12],
    /// AEAD ciphertext (payload + tag).
    pub ciphertext: Vec<u8>,
    /// The associated-data string bound into the seal.
    pub associated_data: String,
    /// The issuer recorded in the associated data.
    pub issuer: String,
    /// The capability subject.
    pub subject: String,
    /// The requesting peer id.
    pub peer_id: String,
    /// The capability token's jti.
    pub capability_token_jti: String,
    /// This envelope's expiry, Unix seconds.
    pub expires_at: i64,
}

/// Envelope construction errors.
#[derive(Debug, Error)]
pub enum EnvelopeBuildError {
    /// `min(now + 120s, claims.exp)` was not in the future.
    #[error("capability already expired or expires immediately")]
    AlreadyExpired,
    /// AEAD sealing failed.
    #[error("seal failed")]
    Seal,
}

/// `Build(asset, pluginKey, clientX25519Pub, capabilityClaims, issuer, now)`.
pub fn build(
    asset: &PluginAsset,
    plugin_key: &[u8; 32],
    client_x25519_pub: &[u8; 32],
    claims: &CapabilityClaims,
    issuer: &str,
    now: i64,
) -> Result<PluginEnvelope, EnvelopeBuildError> {
    let expires_at = std::cmp::min(now + MAX_ENVELOPE_LIFETIME_SECS, claims.exp);
    if expires_at <= now {
        return Err(EnvelopeBuildError::AlreadyExpired);
    }

    let mut server_secret_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut server_secret_bytes);
    let server_secret = x25519_dalek::StaticSecret::from(server_secret_bytes);
    let server_public = x25519_dalek::PublicKey::from(&server_secret);
    let client_public = x25519_dalek::PublicKey::from(*client_x25519_pub);
    let shared_secret = server_secret.diffie_hellman(&client_public);

    let associated_data = format!(
        "iss={}|sub={}|peer={}|jti={}|plugin={}|version={}|sha256={}|scope={}|exp={}",
        issuer, claims.sub, claims.peer_id, claims.jti, asset.id, asset.version, asset.bundle_sha256, claims.scope, expires_at
    );

    let mut wrap_key_input = Vec::with_capacity(32 + associated_data.len());
    wrap_key_input.extend_from_slice(shared_secret.as_bytes());
    wrap_key_input.extend_from_slice(associated_data.as_bytes());
    let wrap_key = Sha256::digest(&wrap_key_input);

    let payload = serde_json::json!({
        "key": STANDARD.encode(plugin_key),
        "pluginId": asset.id,
        "version": asset.version,
        "requiredScope": asset.required_scope,
        "bundleSHA256": asset.bundle_sha256,
        "sub": claims.sub,
        "peerID": claims.peer_id,
        "jti": claims.jti,
        "exp": expires_at,
    });
    let plaintext = serde_json::to_vec(&payload).map_err(|_| EnvelopeBuildError::Seal)?;

    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let cipher = Aes256Gcm::new_from_slice(&wrap_key).map_err(|_| EnvelopeBuildError::Seal)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: &plaintext, aad: associated_data.as_bytes() })
        .map_err(|_| EnvelopeBuildError::Seal)?;

    Ok(PluginEnvelope {
        plugin_id: asset.id.clone(),
        version: asset.version.clone(),
        required_scope: asset.required_scope.clone(),
        bundle_sha256: asset.bundle_sha256.clone(),
        alg: ALGORITHM,
        server_x25519_pub: server_public.to_bytes(),
        nonce: nonce_bytes,
        ciphertext,
        associated_data,
        issuer: issuer.to_string(),
        subject: claims.sub.clone(),
        peer_id: claims.peer_id.clone(),
        capability_token_jti: claims.jti.clone(),
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> PluginAsset {
        PluginAsset {
            id: "demo".to_string(),
            version: "1.0.0".to_string(),
            required_scope: "orbpro:base".to_string(),
            content_type: "application/wasm".to_string(),
            cache_control: "public, max-age=300, stale-while-revalidate=3600".to_string(),
            bundle_sha256: hex::encode(Sha256::digest(b"bundle-bytes")),
            size_bytes: 12,
            encrypted_path: "bundles/demo.enc".into(),
            key_path: "bundles/demo.key".into(),
        }
    }

    fn claims(exp: i64) -> CapabilityClaims {
        CapabilityClaims {
            sub: "user-1".to_string(),
            peer_id: "peer-1".to_string(),
            jti: "jti-1".to_string(),
            scope: "orbpro:base".to_string(),
            exp,
        }
    }

    fn open_for_test(server_pub: &[u8; 32], client_secret_bytes: [u8; 32], envelope: &PluginEnvelope) -> serde_json::Value {
        let client_secret = x25519_dalek::StaticSecret::from(client_secret_bytes);
        let server_public = x25519_dalek::PublicKey::from(*server_pub);
        let shared = client_secret.diffie_hellman(&server_public);

        let mut wrap_key_input = Vec::with_capacity(32 + envelope.associated_data.len());
        wrap_key_input.extend_from_slice(shared.as_bytes());
        wrap_key_input.extend_from_slice(envelope.associated_data.as_bytes());
        let wrap_key = Sha256::digest(&wrap_key_input);

        let cipher = Aes256Gcm::new_from_slice(&wrap_key).unwrap();
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&envelope.nonce),
                Payload { msg: &envelope.ciphertext, aad: envelope.associated_data.as_bytes() },
            )
            .unwrap();
        serde_json::from_slice(&plaintext).unwrap()
    }

    #[test]
    fn envelope_opens_to_the_wrapped_key_and_binds_every_claim_field() {
        let client_secret_bytes = [5u8; 32];
        let client_secret = x25519_dalek::StaticSecret::from(client_secret_bytes);
        let client_public = x25519_dalek::PublicKey::from(&client_secret);

        let plugin_key = [1u8; 32];
        let asset = asset();
        let now = 1_000;
        let envelope = build(&asset, &plugin_key, &client_public.to_bytes(), &claims(now + 999), "sdn-issuer", now).unwrap();

        assert_eq!(envelope.alg, ALGORITHM);
        assert_eq!(envelope.expires_at, now + MAX_ENVELOPE_LIFETIME_SECS);
        for field in ["iss=sdn-issuer", "sub=user-1", "peer=peer-1", "jti=jti-1", "plugin=demo", "version=1.0.0", "scope=orbpro:base"] {
            assert!(envelope.associated_data.contains(field), "missing {field} in {}", envelope.associated_data);
        }

        let opened = open_for_test(&envelope.server_x25519_pub, client_secret_bytes, &envelope);
        assert_eq!(opened["key"], STANDARD.encode(plugin_key));
        assert_eq!(opened["bundleSHA256"], asset.bundle_sha256);
    }

    #[test]
    fn expiry_is_capped_by_the_fixed_envelope_lifetime() {
        let plugin_key = [1u8; 32];
        let asset = asset();
        let now = 1_000;
        let envelope = build(&asset, &plugin_key, &[2u8; 32], &claims(now + 10_000), "sdn-issuer", now).unwrap();
        assert_eq!(envelope.expires_at, now + MAX_ENVELOPE_LIFETIME_SECS);
    }

    #[test]
    fn already_expired_claim_is_rejected() {
        let plugin_key = [1u8; 32];
        let asset = asset();
        let now = 1_000;
        let err = build(&asset, &plugin_key, &[2u8; 32], &claims(now), "sdn-issuer", now).unwrap_err();
        assert!(matches!(err, EnvelopeBuildError::AlreadyExpired));
    }
}
