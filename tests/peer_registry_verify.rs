#![forbid(unsafe_code)]

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use sdn_node::networking::peer_registry::{load_and_verify_peer_registry_now, PeerRegistryPolicy};
use std::fs;

#[test]
fn peer_registry_loads_and_verifies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let signing = SigningKey::generate(&mut OsRng);
    let pk = signing.verifying_key();

    let peer = "12D3KooWPYkNZrwQo5yESaXbBQ64f3GyFaUPFynPUoE7PfJ4xL4u";
    let network = "sdn/mainnet/v1";

    let issued_at_ms: u64 = 1768336425892;
    let expires_at_ms: u64 = 1768336485892;

    // Canonical bytes as specified in networking::peer_registry.
    let msg = format!(
        "v1\nnetwork={}\nissued_at_ms={}\nexpires_at_ms={}\npeers\n{}\n",
        network, issued_at_ms, expires_at_ms, peer
    );
    let sig = signing.sign(msg.as_bytes());

    let toml = format!(
        "version = 1\nnetwork = \"{}\"\nissued_at_ms = {}\nexpires_at_ms = {}\npeers = [\"{}\"]\n\nsignature_hex = \"{}\"\n",
        network,
        issued_at_ms,
        expires_at_ms,
        peer,
        hex::encode(sig.to_bytes())
    );

    let path = dir.path().join("peer_registry.toml");
    fs::write(&path, toml).expect("write");

    let mut pol = PeerRegistryPolicy::default_with_now(issued_at_ms + 1);
    pol.expected_network = Some(network);
    pol.require_freshness_fields = true;

    let allow = load_and_verify_peer_registry_now(path.to_str().unwrap(), &hex::encode(pk.to_bytes()), &pol)
        .expect("load and verify");
    assert_eq!(allow, vec![peer.to_string()]);
}
