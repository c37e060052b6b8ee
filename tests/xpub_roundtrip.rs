#![forbid(unsafe_code)]

use sdn_node::identity::{parse_xpub, serialize_xpub};
use sdn_node::identity::xpub::{extract_ed25519_public_key, Xpub};

fn sample(public_key: [u8; 32]) -> Xpub {
    Xpub {
        depth: 2,
        parent_fingerprint: [0xAA, 0xBB, 0xCC, 0xDD],
        child_number: 7,
        chain_code: [0x42; 32],
        public_key,
    }
}

#[test]
fn serialize_then_parse_round_trips_every_field() {
    let pubkey = [0xAA; 32];
    let xpub = sample(pubkey);
    let serialized = serialize_xpub(&xpub);
    let parsed = parse_xpub(&serialized).expect("parse");
    assert_eq!(parsed, xpub);
}

#[test]
fn extract_ed25519_matches_the_signing_public_key() {
    let pubkey = [0x11; 32];
    let xpub = sample(pubkey);
    let serialized = serialize_xpub(&xpub);
    let extracted = extract_ed25519_public_key(&serialized).expect("extract");
    assert_eq!(extracted, pubkey);
}

#[test]
fn a_single_flipped_character_breaks_the_checksum() {
    let serialized = serialize_xpub(&sample([0x33; 32]));
    let mut chars: Vec<char> = serialized.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == 'a' { 'b' } else { 'a' };
    let tampered: String = chars.into_iter().collect();
    assert!(parse_xpub(&tampered).is_err());
}
