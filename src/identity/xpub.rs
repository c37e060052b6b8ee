// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Extended-public-key codec (C2): a Base58Check encoding of a node's
//! Ed25519 signing key plus its SLIP-10 chain code, so peers can address
//! and verify a node without holding its private material.
//!
//! Wire layout (78 bytes, before the 4-byte checksum):
//! `version(4) || depth(1) || parent_fingerprint(4) || child_number(4) ||
//! chain_code(32) || 0x00 || ed25519_public_key(32)`.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Version prefix distinguishing SDN xpubs from unrelated Base58Check data.
pub const VERSION: u32 = 0x0534_ED10;

const PAYLOAD_LEN: usize = 78;
const CHECKSUM_LEN: usize = 4;

/// A parsed extended public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Xpub {
    /// Derivation depth (0 for a master key).
    pub depth: u8,
    /// First 4 bytes of SHA-256(parent public key); zero at depth 0.
    pub parent_fingerprint: [u8; 4],
    /// The hardened-or-not child index used to derive this key.
    pub child_number: u32,
    /// SLIP-10 chain code.
    pub chain_code: [u8; 32],
    /// Raw 32-byte Ed25519 public key.
    pub public_key: [u8; 32],
}

/// Xpub codec errors. Parsing is total: malformed input always yields one
/// of these rather than panicking.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum XpubError {
    /// Input was not valid Base58.
    #[error("invalid base58")]
    InvalidBase58,
    /// Decoded payload was not exactly 78 bytes plus a 4-byte checksum.
    #[error("invalid length")]
    InvalidLength,
    /// The trailing checksum did not match the double-SHA256 of the payload.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// The 4-byte version prefix did not match [`VERSION`].
    #[error("wrong version")]
    WrongVersion,
    /// The byte preceding the public key was not the expected `0x00` tag.
    #[error("invalid public key prefix")]
    InvalidPublicKeyPrefix,
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Serialize an [`Xpub`] to its Base58Check string form.
pub fn serialize(xpub: &Xpub) -> String {
    let mut payload = Vec::with_capacity(PAYLOAD_LEN);
    payload.extend_from_slice(&VERSION.to_be_bytes());
    payload.push(xpub.depth);
    payload.extend_from_slice(&xpub.parent_fingerprint);
    payload.extend_from_slice(&xpub.child_number.to_be_bytes());
    payload.extend_from_slice(&xpub.chain_code);
    payload.push(0x00);
    payload.extend_from_slice(&xpub.public_key);
    debug_assert_eq!(payload.len(), PAYLOAD_LEN);

    let checksum = double_sha256(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(payload).into_string()
}

/// Parse a Base58Check xpub string. Never panics on malformed input.
pub fn parse(s: &str) -> Result<Xpub, XpubError> {
    let decoded = bs58::decode(s).into_vec().map_err(|_| XpubError::InvalidBase58)?;
    if decoded.len() != PAYLOAD_LEN + CHECKSUM_LEN {
        return Err(XpubError::InvalidLength);
    }
    let (payload, checksum) = decoded.split_at(PAYLOAD_LEN);
    let expected = double_sha256(payload);
    if &expected[..CHECKSUM_LEN] != checksum {
        return Err(XpubError::ChecksumMismatch);
    }

    let version = u32::from_be_bytes(payload[0..4].try_into().unwrap());
    if version != VERSION {
        return Err(XpubError::WrongVersion);
    }

    let depth = payload[4];
    let mut parent_fingerprint = [0u8; 4];
    parent_fingerprint.copy_from_slice(&payload[5..9]);
    let child_number = u32::from_be_bytes(payload[9..13].try_into().unwrap());
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&payload[13..45]);

    if payload[45] != 0x00 {
        return Err(XpubError::InvalidPublicKeyPrefix);
    }
    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(&payload[46..78]);

    Ok(Xpub { depth, parent_fingerprint, child_number, chain_code, public_key })
}

/// Convenience accessor mirroring the spec's `ExtractEd25519PublicKey`.
pub fn extract_ed25519_public_key(s: &str) -> Result<[u8; 32], XpubError> {
    parse(s).map(|x| x.public_key)
}
