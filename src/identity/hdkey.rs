// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! SLIP-10 hardened-only key derivation over the ed25519 curve tree.
//!
//! Ed25519 only supports hardened derivation under SLIP-10, so every path
//! component carries the hardened bit. We reuse the same tree to derive
//! the node's X25519 encryption key (clamping the derived 32 bytes as a
//! static secret) rather than inventing a second derivation scheme.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";
const HARDENED_BIT: u32 = 0x8000_0000;

/// A derived node in the SLIP-10 ed25519 tree: 32-byte key material plus
/// its 32-byte chain code.
#[derive(Clone)]
pub struct DerivedNode {
    pub key: [u8; 32],
    pub chain_code: [u8; 32],
}

impl Drop for DerivedNode {
    fn drop(&mut self) {
        self.key.iter_mut().for_each(|b| *b = 0);
        self.chain_code.iter_mut().for_each(|b| *b = 0);
    }
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let out = mac.finalize().into_bytes();
    let mut buf = [0u8; 64];
    buf.copy_from_slice(&out);
    buf
}

fn master_node(seed: &[u8]) -> DerivedNode {
    let i = hmac_sha512(ED25519_SEED_KEY, seed);
    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&i[0..32]);
    chain_code.copy_from_slice(&i[32..64]);
    DerivedNode { key, chain_code }
}

fn child_node(parent: &DerivedNode, index_hardened: u32) -> DerivedNode {
    // SLIP-10 ed25519 hardened derivation: data = 0x00 || parent_key || ser32(index).
    let mut data = Vec::with_capacity(1 + 32 + 4);
    data.push(0u8);
    data.extend_from_slice(&parent.key);
    data.extend_from_slice(&index_hardened.to_be_bytes());

    let i = hmac_sha512(&parent.chain_code, &data);
    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&i[0..32]);
    chain_code.copy_from_slice(&i[32..64]);
    DerivedNode { key, chain_code }
}

/// Derive the node at `path` (each component given as its unhardened
/// index; the hardened bit is applied here, matching the `'` suffix
/// convention in spec.md's paths).
pub fn derive_path(seed: &[u8], path: &[u32]) -> DerivedNode {
    let mut node = master_node(seed);
    for &index in path {
        node = child_node(&node, index | HARDENED_BIT);
    }
    node
}

/// `m/44'/1957'/<acct>'/0'/0'` — the signing key path.
pub fn signing_path(account: u32) -> [u32; 5] {
    [44, 1957, account, 0, 0]
}

/// `m/44'/1957'/<acct>'/1'/0'` — the encryption key path.
pub fn encryption_path(account: u32) -> [u32; 5] {
    [44, 1957, account, 1, 0]
}
