// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Per-curve hybrid encryption: generate an ephemeral key pair on the
//! recipient's curve, ECDH, HKDF-SHA-256 under a fixed context label,
//! then AEAD-seal the payload. Relays see only the routing header.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::XChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use hkdf::Hkdf;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

const HKDF_CONTEXT: &[u8] = b"sdn-v1";
const TAG_LEN: usize = 16;

/// The curve a recipient's long-term encryption key lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    /// Curve25519 Diffie-Hellman.
    X25519,
    /// secp256k1 ECDH.
    Secp256k1,
    /// NIST P-256 ECDH.
    P256,
}

/// The AEAD a deployment has fixed for its envelopes. Decryption rejects
/// any envelope whose tag doesn't match a recognized variant — it never
/// falls back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    /// AES-256 in GCM mode.
    Aes256Gcm,
    /// XChaCha20-Poly1305.
    XChaCha20Poly1305,
}

impl Algorithm {
    /// The wire tag recorded in the envelope's `algorithm` field.
    pub fn tag(self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "X25519+SHA256+AES-256-GCM",
            Algorithm::XChaCha20Poly1305 => "X25519+SHA256+XChaCha20-Poly1305",
        }
    }

    /// Parse a wire tag. Unrecognized tags are rejected, not defaulted.
    pub fn from_tag(tag: &str) -> Result<Self, EnvelopeError> {
        match tag {
            "X25519+SHA256+AES-256-GCM" => Ok(Algorithm::Aes256Gcm),
            "X25519+SHA256+XChaCha20-Poly1305" => Ok(Algorithm::XChaCha20Poly1305),
            _ => Err(EnvelopeError::UnknownAlgorithm),
        }
    }

    fn nonce_len(self) -> usize {
        match self {
            Algorithm::Aes256Gcm => 12,
            Algorithm::XChaCha20Poly1305 => 24,
        }
    }
}

/// The wire envelope accompanying an encrypted payload.
#[derive(Clone, Debug)]
pub struct EciesEnvelope {
    /// Fixed-per-deployment AEAD choice.
    pub algorithm: Algorithm,
    /// The ephemeral public key generated for this encryption, curve-encoded.
    pub ephemeral_public_key: Vec<u8>,
    /// First 8 bytes of SHA-256(recipient long-term public key).
    pub recipient_key_fingerprint: [u8; 8],
    /// AEAD nonce (12 B for AES-256-GCM, 24 B for XChaCha20-Poly1305).
    pub nonce: Vec<u8>,
    /// Ciphertext, excluding the trailing authentication tag.
    pub ciphertext: Vec<u8>,
    /// 16-byte authentication tag (same length for both supported AEADs).
    pub tag: [u8; TAG_LEN],
}

/// Envelope errors.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope's algorithm tag was not one this build recognizes.
    #[error("unknown algorithm")]
    UnknownAlgorithm,
    /// The recipient or ephemeral public key had the wrong shape for its curve.
    #[error("invalid key")]
    InvalidKey,
    /// ECDH or key derivation failed.
    #[error("key agreement failed")]
    KeyAgreement,
    /// AEAD seal/open failed (wrong key, tampered ciphertext, or wrong AAD).
    #[error("aead failure")]
    Aead,
}

fn fingerprint(recipient_public_key: &[u8]) -> [u8; 8] {
    let digest = Sha256::digest(recipient_public_key);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

fn hkdf_key(shared_secret: &[u8]) -> Result<[u8; 32], EnvelopeError> {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut out = [0u8; 32];
    hk.expand(HKDF_CONTEXT, &mut out).map_err(|_| EnvelopeError::KeyAgreement)?;
    Ok(out)
}

fn ecdh_shared_secret(curve: Curve, recipient_public_key: &[u8]) -> Result<(Vec<u8>, [u8; 32]), EnvelopeError> {
    match curve {
        Curve::X25519 => {
            if recipient_public_key.len() != 32 {
                return Err(EnvelopeError::InvalidKey);
            }
            let mut recipient_bytes = [0u8; 32];
            recipient_bytes.copy_from_slice(recipient_public_key);
            let recipient = x25519_dalek::PublicKey::from(recipient_bytes);

            let ephemeral_secret = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
            let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral_secret);
            let shared = ephemeral_secret.diffie_hellman(&recipient);

            Ok((ephemeral_public.as_bytes().to_vec(), *shared.as_bytes()))
        }
        Curve::Secp256k1 => {
            let recipient = k256::PublicKey::from_sec1_bytes(recipient_public_key).map_err(|_| EnvelopeError::InvalidKey)?;
            let ephemeral_secret = k256::ecdh::EphemeralSecret::random(&mut OsRng);
            let ephemeral_public = k256::EncodedPoint::from(ephemeral_secret.public_key());
            let shared = ephemeral_secret.diffie_hellman(&recipient);

            let mut secret_bytes = [0u8; 32];
            secret_bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
            Ok((ephemeral_public.as_bytes().to_vec(), secret_bytes))
        }
        Curve::P256 => {
            let recipient = p256::PublicKey::from_sec1_bytes(recipient_public_key).map_err(|_| EnvelopeError::InvalidKey)?;
            let ephemeral_secret = p256::ecdh::EphemeralSecret::random(&mut OsRng);
            let ephemeral_public = ephemeral_secret.public_key().to_encoded_point(true);
            let shared = ephemeral_secret.diffie_hellman(&recipient);

            let mut secret_bytes = [0u8; 32];
            secret_bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
            Ok((ephemeral_public.as_bytes().to_vec(), secret_bytes))
        }
    }
}

fn ecdh_shared_secret_decrypt(
    curve: Curve,
    ephemeral_public_key: &[u8],
    recipient_secret: &[u8],
) -> Result<[u8; 32], EnvelopeError> {
    match curve {
        Curve::X25519 => {
            if ephemeral_public_key.len() != 32 || recipient_secret.len() != 32 {
                return Err(EnvelopeError::InvalidKey);
            }
            let mut eph = [0u8; 32];
            eph.copy_from_slice(ephemeral_public_key);
            let mut sec = [0u8; 32];
            sec.copy_from_slice(recipient_secret);

            let secret = x25519_dalek::StaticSecret::from(sec);
            let ephemeral_public = x25519_dalek::PublicKey::from(eph);
            let shared = secret.diffie_hellman(&ephemeral_public);
            Ok(*shared.as_bytes())
        }
        Curve::Secp256k1 => {
            let ephemeral = k256::PublicKey::from_sec1_bytes(ephemeral_public_key).map_err(|_| EnvelopeError::InvalidKey)?;
            let secret = k256::SecretKey::from_slice(recipient_secret).map_err(|_| EnvelopeError::InvalidKey)?;
            let shared = k256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
            let mut secret_bytes = [0u8; 32];
            secret_bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
            Ok(secret_bytes)
        }
        Curve::P256 => {
            let ephemeral = p256::PublicKey::from_sec1_bytes(ephemeral_public_key).map_err(|_| EnvelopeError::InvalidKey)?;
            let secret = p256::SecretKey::from_slice(recipient_secret).map_err(|_| EnvelopeError::InvalidKey)?;
            let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
            let mut secret_bytes = [0u8; 32];
            secret_bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
            Ok(secret_bytes)
        }
    }
}

fn aead_seal(algorithm: Algorithm, key: &[u8; 32], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    match algorithm {
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::Aead)?;
            cipher
                .encrypt(aes_gcm::Nonce::from_slice(nonce), Payload { msg: plaintext, aad: &[] })
                .map_err(|_| EnvelopeError::Aead)
        }
        Algorithm::XChaCha20Poly1305 => {
            let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| EnvelopeError::Aead)?;
            cipher
                .encrypt(chacha20poly1305::XNonce::from_slice(nonce), Payload { msg: plaintext, aad: &[] })
                .map_err(|_| EnvelopeError::Aead)
        }
    }
}

fn aead_open(algorithm: Algorithm, key: &[u8; 32], nonce: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    match algorithm {
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::Aead)?;
            cipher
                .decrypt(aes_gcm::Nonce::from_slice(nonce), Payload { msg: ciphertext_and_tag, aad: &[] })
                .map_err(|_| EnvelopeError::Aead)
        }
        Algorithm::XChaCha20Poly1305 => {
            let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| EnvelopeError::Aead)?;
            cipher
                .decrypt(chacha20poly1305::XNonce::from_slice(nonce), Payload { msg: ciphertext_and_tag, aad: &[] })
                .map_err(|_| EnvelopeError::Aead)
        }
    }
}

/// Encrypt `plaintext` to `recipient_public_key` on `curve`, under the
/// deployment's fixed `algorithm`.
pub fn encrypt(
    algorithm: Algorithm,
    curve: Curve,
    recipient_public_key: &[u8],
    plaintext: &[u8],
) -> Result<EciesEnvelope, EnvelopeError> {
    let (ephemeral_public_key, shared_secret) = ecdh_shared_secret(curve, recipient_public_key)?;
    let key = hkdf_key(&shared_secret)?;

    let nonce_len = algorithm.nonce_len();
    let mut nonce = vec![0u8; nonce_len];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce);

    let sealed = aead_seal(algorithm, &key, &nonce, plaintext)?;
    if sealed.len() < TAG_LEN {
        return Err(EnvelopeError::Aead);
    }
    let (ciphertext, tag_slice) = sealed.split_at(sealed.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(tag_slice);

    Ok(EciesEnvelope {
        algorithm,
        ephemeral_public_key,
        recipient_key_fingerprint: fingerprint(recipient_public_key),
        nonce,
        ciphertext: ciphertext.to_vec(),
        tag,
    })
}

/// Decrypt an envelope using the recipient's long-term private key bytes
/// for `curve`. Rejects any envelope whose `algorithm` this build does
/// not recognize rather than guessing.
pub fn decrypt(curve: Curve, recipient_secret_key: &[u8], envelope: &EciesEnvelope) -> Result<Vec<u8>, EnvelopeError> {
    let shared_secret = ecdh_shared_secret_decrypt(curve, &envelope.ephemeral_public_key, recipient_secret_key)?;
    let key = hkdf_key(&shared_secret)?;

    let mut sealed = envelope.ciphertext.clone();
    sealed.extend_from_slice(&envelope.tag);
    aead_open(envelope.algorithm, &key, &envelope.nonce, &sealed)
}
