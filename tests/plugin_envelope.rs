#![forbid(unsafe_code)]

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sdn_node::plugins::catalog::{CatalogError, PluginCatalog};
use sdn_node::plugins::envelope::{build, CapabilityClaims, EnvelopeBuildError};
use sdn_node::plugins::key::parse_plugin_key;
use sha2::{Digest, Sha256};
use std::path::Path;

fn write(root: &Path, rel: &str, bytes: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

fn open_envelope(client_secret: &x25519_dalek::StaticSecret, envelope: &sdn_node::plugins::envelope::PluginEnvelope) -> serde_json::Value {
    let server_public = x25519_dalek::PublicKey::from(envelope.server_x25519_pub);
    let shared_secret = client_secret.diffie_hellman(&server_public);

    let mut wrap_key_input = Vec::with_capacity(32 + envelope.associated_data.len());
    wrap_key_input.extend_from_slice(shared_secret.as_bytes());
    wrap_key_input.extend_from_slice(envelope.associated_data.as_bytes());
    let wrap_key = Sha256::digest(&wrap_key_input);

    let cipher = Aes256Gcm::new_from_slice(&wrap_key).unwrap();
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&envelope.nonce),
            Payload { msg: &envelope.ciphertext, aad: envelope.associated_data.as_bytes() },
        )
        .expect("open envelope");
    serde_json::from_slice(&plaintext).unwrap()
}

#[test]
fn catalog_load_key_parse_and_envelope_round_trip_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let plugin_key = [0x5Au8; 32];
    write(root, "bundles/demo.wasm.enc", b"encrypted-wasm-bytes");
    write(root, "bundles/demo.key", hex::encode(plugin_key).as_bytes());
    write(
        root,
        "catalog.json",
        br#"[{"id":"demo","version":"2.3.1","required_scope":"orbpro:premium","encrypted_path":"bundles/demo.wasm.enc","key_path":"bundles/demo.key"}]"#,
    );

    let catalog = PluginCatalog::load(root).expect("catalog loads");
    let asset = catalog.get("demo").expect("asset present");
    assert_eq!(asset.bundle_sha256, hex::encode(Sha256::digest(b"encrypted-wasm-bytes")));

    let bundle_bytes = catalog.read_bundle_verified(asset).expect("checksum still matches");
    assert_eq!(bundle_bytes, b"encrypted-wasm-bytes");

    let key_bytes = std::fs::read(&asset.key_path).unwrap();
    let key = parse_plugin_key(&key_bytes).expect("hex key parses");
    assert_eq!(key, plugin_key);

    let client_secret = x25519_dalek::StaticSecret::from([0x11u8; 32]);
    let client_public = x25519_dalek::PublicKey::from(&client_secret);

    let claims = CapabilityClaims {
        sub: "user-42".to_string(),
        peer_id: "peer-xyz".to_string(),
        jti: "jti-abc".to_string(),
        scope: "orbpro:premium".to_string(),
        exp: 10_000,
    };
    let now = 9_000;
    let envelope = build(asset, &key, client_public.as_bytes(), &claims, "node-issuer-xpub", now).expect("build envelope");

    assert_eq!(envelope.expires_at, now + 120);
    assert_eq!(envelope.plugin_id, "demo");
    assert_eq!(envelope.bundle_sha256, asset.bundle_sha256);
    for field in [
        "iss=node-issuer-xpub",
        "sub=user-42",
        "peer=peer-xyz",
        "jti=jti-abc",
        "plugin=demo",
        "version=2.3.1",
        "scope=orbpro:premium",
    ] {
        assert!(envelope.associated_data.contains(field), "missing {field} in {}", envelope.associated_data);
    }

    let opened = open_envelope(&client_secret, &envelope);
    assert_eq!(opened["key"].as_str().unwrap(), STANDARD.encode(plugin_key));
    assert_eq!(opened["pluginId"].as_str().unwrap(), "demo");
    assert_eq!(opened["exp"].as_i64().unwrap(), now + 120);
}

#[test]
fn envelope_lifetime_is_capped_by_the_capability_s_own_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "bundles/demo.wasm.enc", b"bytes");
    write(root, "bundles/demo.key", &[1u8; 32]);
    write(
        root,
        "catalog.json",
        br#"[{"id":"demo","version":"1.0.0","encrypted_path":"bundles/demo.wasm.enc","key_path":"bundles/demo.key"}]"#,
    );
    let catalog = PluginCatalog::load(root).unwrap();
    let asset = catalog.get("demo").unwrap();
    let key = [1u8; 32];
    let client_public = x25519_dalek::PublicKey::from(&x25519_dalek::StaticSecret::from([2u8; 32]));

    let now = 1_000;
    // Capability expires in 30s, well under the 120s cap.
    let claims = CapabilityClaims { sub: "s".into(), peer_id: "p".into(), jti: "j".into(), scope: "orbpro:base".into(), exp: now + 30 };
    let envelope = build(asset, &key, client_public.as_bytes(), &claims, "issuer", now).unwrap();
    assert_eq!(envelope.expires_at, now + 30);

    // Already-expired capability is rejected outright.
    let expired_claims = CapabilityClaims { exp: now - 1, ..claims };
    let err = build(asset, &key, client_public.as_bytes(), &expired_claims, "issuer", now).unwrap_err();
    assert!(matches!(err, EnvelopeBuildError::AlreadyExpired));
}

#[test]
fn a_catalog_entry_escaping_the_plugin_root_is_rejected_at_load_and_never_reaches_an_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "catalog.json", br#"[{"id":"evil","version":"1.0.0","encrypted_path":"../../etc/passwd","key_path":"bundles/evil.key"}]"#);

    let err = PluginCatalog::load(root).unwrap_err();
    assert!(matches!(err, CatalogError::PathEscapesRoot(id) if id == "evil"));

    let catalog = PluginCatalog::default();
    assert!(catalog.get("evil").is_none());
}
