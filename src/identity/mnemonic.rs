// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Mnemonic generation and at-rest encryption.
//!
//! The mnemonic file on disk is either ASCII plaintext, or the blob
//! `salt(32) || nonce(24) || ciphertext` under XChaCha20-Poly1305, keyed
//! by Argon2id(t=3, m=64 MiB, p=4, out=32) over the configured password.
//! When no password is configured one is derived from a machine
//! fingerprint; this is documented obfuscation, not security.

use argon2::Argon2;
use bip39::Mnemonic;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroize;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const ARGON2_MEM_KIB: u32 = 64 * 1024;
const ARGON2_TIME: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

/// Mnemonic errors.
#[derive(Debug, Error)]
pub enum MnemonicError {
    /// Underlying file I/O failed.
    #[error("io")]
    Io,
    /// The mnemonic text failed BIP-39 validation.
    #[error("invalid mnemonic")]
    InvalidMnemonic,
    /// Wrong password or tampered ciphertext — deliberately indistinguishable.
    #[error("decryption failed")]
    DecryptionFailed,
    /// A password is required to decrypt this mnemonic file.
    #[error("missing passphrase")]
    MissingPassphrase,
    /// Argon2/AEAD setup failed.
    #[error("crypto")]
    Crypto,
}

/// Generate a fresh 24-word BIP-39 mnemonic (256-bit entropy — the
/// standard word count/entropy pairing for 24 words; see DESIGN.md for
/// the resolution of spec.md's 192-bit-entropy wording).
pub fn generate() -> Mnemonic {
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy);
    let m = Mnemonic::from_entropy(&entropy).expect("32 bytes is valid BIP-39 entropy");
    entropy.zeroize();
    m
}

fn derive_aead_key(password: &[u8], salt: &[u8; SALT_LEN]) -> Result<[u8; 32], MnemonicError> {
    let params = argon2::Params::new(ARGON2_MEM_KIB, ARGON2_TIME, ARGON2_PARALLELISM, Some(32))
        .map_err(|_| MnemonicError::Crypto)?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    let mut out = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|_| MnemonicError::Crypto)?;
    Ok(out)
}

/// Encrypt `plaintext` (the mnemonic's UTF-8 bytes) under `password`.
pub fn encrypt(plaintext: &[u8], password: &[u8]) -> Result<Vec<u8>, MnemonicError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let mut key = derive_aead_key(password, &salt)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| MnemonicError::Crypto)?;
    key.zeroize();

    let nonce = XNonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| MnemonicError::Crypto)?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`encrypt`]. Returns `DecryptionFailed` for
/// both a wrong password and a tampered ciphertext — the two must not be
/// distinguishable to the caller.
pub fn decrypt(blob: &[u8], password: &[u8]) -> Result<Vec<u8>, MnemonicError> {
    if blob.len() < SALT_LEN + NONCE_LEN + 16 {
        return Err(MnemonicError::DecryptionFailed);
    }
    let salt: [u8; SALT_LEN] = blob[0..SALT_LEN].try_into().unwrap();
    let nonce_bytes = &blob[SALT_LEN..SALT_LEN + NONCE_LEN];
    let ciphertext = &blob[SALT_LEN + NONCE_LEN..];

    let mut key = derive_aead_key(password, &salt)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| MnemonicError::Crypto)?;
    key.zeroize();

    let nonce = XNonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| MnemonicError::DecryptionFailed)
}

/// Heuristic plaintext/encrypted detection: plaintext mnemonic files are
/// entirely printable ASCII in the first 16 bytes.
pub fn looks_encrypted(bytes: &[u8]) -> bool {
    let probe = &bytes[..bytes.len().min(16)];
    !probe.iter().all(|&b| (0x20..=0x7e).contains(&b))
}

/// Derive a weak, unattended-start password from a machine fingerprint
/// (hostname + OS + arch, salted with the home directory path) via
/// Argon2id. This is obfuscation only, never a substitute for an
/// operator-supplied password.
pub fn machine_fingerprint_password() -> Result<[u8; 32], MnemonicError> {
    let hostname = hostname_best_effort();
    let fingerprint = format!("{hostname}|{}|{}", std::env::consts::OS, std::env::consts::ARCH);
    let home = std::env::var("HOME").unwrap_or_default();

    let mut salt = [0u8; SALT_LEN];
    let home_bytes = home.as_bytes();
    for (i, b) in salt.iter_mut().enumerate() {
        *b = home_bytes.get(i % home_bytes.len().max(1)).copied().unwrap_or(0);
    }
    derive_aead_key(fingerprint.as_bytes(), &salt)
}

fn hostname_best_effort() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::process::Command::new("hostname")
                .output()
                .ok()
                .and_then(|o| String::from_utf8(o.stdout).ok())
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Load or create the mnemonic at `path`, decrypting it with `password`
/// if the file is encrypted (or with the machine-fingerprint password
/// when `password` is `None`).
pub fn load_or_create(path: &std::path::Path, password: Option<&[u8]>) -> Result<Mnemonic, MnemonicError> {
    if path.exists() {
        let bytes = std::fs::read(path).map_err(|_| MnemonicError::Io)?;
        let phrase_bytes = if looks_encrypted(&bytes) {
            match password {
                Some(p) => decrypt(&bytes, p)?,
                None => {
                    let derived = machine_fingerprint_password()?;
                    decrypt(&bytes, &derived)?
                }
            }
        } else {
            bytes
        };
        let phrase = String::from_utf8(phrase_bytes).map_err(|_| MnemonicError::InvalidMnemonic)?;
        return Mnemonic::parse(phrase.trim()).map_err(|_| MnemonicError::InvalidMnemonic);
    }

    let mnemonic = generate();
    let phrase = mnemonic.to_string();
    let on_disk: Vec<u8> = match password {
        Some(p) => encrypt(phrase.as_bytes(), p)?,
        None => {
            let derived = machine_fingerprint_password()?;
            encrypt(phrase.as_bytes(), &derived)?
        }
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|_| MnemonicError::Io)?;
    }
    std::fs::write(path, &on_disk).map_err(|_| MnemonicError::Io)?;
    set_private_perms_best_effort(path);
    Ok(mnemonic)
}

fn set_private_perms_best_effort(path: &std::path::Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_matches_password() {
        let m = generate();
        let phrase = m.to_string();
        let blob = encrypt(phrase.as_bytes(), b"correct horse battery staple").unwrap();
        let out = decrypt(&blob, b"correct horse battery staple").unwrap();
        assert_eq!(out, phrase.as_bytes());
    }

    #[test]
    fn wrong_password_is_decryption_failed_not_invalid_key() {
        let m = generate();
        let phrase = m.to_string();
        let blob = encrypt(phrase.as_bytes(), b"right password").unwrap();
        let err = decrypt(&blob, b"wrong password").unwrap_err();
        assert!(matches!(err, MnemonicError::DecryptionFailed));
    }

    #[test]
    fn tampered_ciphertext_is_same_error_as_wrong_password() {
        let m = generate();
        let phrase = m.to_string();
        let mut blob = encrypt(phrase.as_bytes(), b"pw").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        let err = decrypt(&blob, b"pw").unwrap_err();
        assert!(matches!(err, MnemonicError::DecryptionFailed));
    }

    #[test]
    fn plaintext_heuristic() {
        assert!(!looks_encrypted(b"abandon abandon abandon abandon"));
        assert!(looks_encrypted(&[0u8; 32]));
    }
}
