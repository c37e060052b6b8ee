// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Key manager (C1): load-or-create the node's signing and encryption
//! key pairs, sign/verify, and export/import an encrypted identity blob.

use super::hdkey;
use super::mnemonic::{self, MnemonicError};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret as XStaticSecret};
use zeroize::Zeroize;

/// Keystore errors.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// A required key file is missing and the keystore is not allowed to generate one.
    #[error("key not found")]
    KeyNotFound,
    /// A key file already exists where one was about to be created.
    #[error("key already exists")]
    KeyAlreadyExists,
    /// On-disk key bytes do not match the mnemonic-derived key.
    #[error("invalid key")]
    InvalidKey,
    /// Wrong password or tampered ciphertext — deliberately indistinguishable.
    #[error("decryption failed")]
    DecryptionFailed,
    /// Underlying I/O failure.
    #[error("io")]
    Io,
    /// Cryptographic operation failed.
    #[error("crypto")]
    Crypto,
}

impl From<MnemonicError> for KeystoreError {
    fn from(e: MnemonicError) -> Self {
        match e {
            MnemonicError::DecryptionFailed => KeystoreError::DecryptionFailed,
            MnemonicError::Io => KeystoreError::Io,
            MnemonicError::InvalidMnemonic => KeystoreError::InvalidKey,
            MnemonicError::MissingPassphrase => KeystoreError::DecryptionFailed,
            MnemonicError::Crypto => KeystoreError::Crypto,
        }
    }
}

fn atomic_write_private(path: &Path, bytes: &[u8]) -> Result<(), KeystoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|_| KeystoreError::Io)?;
    }
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|_| KeystoreError::Io)?;
        f.write_all(bytes).map_err(|_| KeystoreError::Io)?;
        let _ = f.sync_all();
    }
    set_private_perms_best_effort(&tmp);
    std::fs::rename(&tmp, path).map_err(|_| KeystoreError::Io)?;
    set_private_perms_best_effort(path);
    Ok(())
}

fn set_private_perms_best_effort(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
}

struct KeyPaths {
    signing_private: PathBuf,
    signing_public: PathBuf,
    encryption_private: PathBuf,
    encryption_public: PathBuf,
    mnemonic: PathBuf,
}

impl KeyPaths {
    fn new(dir: &Path) -> Self {
        let keys = dir.join("keys");
        Self {
            signing_private: keys.join("signing_private.key"),
            signing_public: keys.join("signing_public.key"),
            encryption_private: keys.join("encryption_private.key"),
            encryption_public: keys.join("encryption_public.key"),
            mnemonic: keys.join("mnemonic"),
        }
    }

    fn all_exist(&self) -> bool {
        self.signing_private.exists()
            && self.signing_public.exists()
            && self.encryption_private.exists()
            && self.encryption_public.exists()
    }

    fn any_exists(&self) -> bool {
        self.signing_private.exists()
            || self.signing_public.exists()
            || self.encryption_private.exists()
            || self.encryption_public.exists()
    }
}

/// The node's identity: signing (Ed25519) and encryption (X25519) key
/// pairs, re-derivable from the mnemonic on every start.
pub struct KeyManager {
    signing: SigningKey,
    encryption: XStaticSecret,
    encryption_public: XPublicKey,
}

impl KeyManager {
    /// Load the identity rooted at `data_dir`, generating it on first run.
    /// `password` encrypts the mnemonic at rest; `None` falls back to the
    /// machine-fingerprint password (unattended-start convenience, not security).
    pub fn load_or_create(data_dir: &Path, password: Option<&[u8]>) -> Result<Self, KeystoreError> {
        let paths = KeyPaths::new(data_dir);

        // I1: key files exist iff a complete {signing, encryption} pair is loadable.
        if paths.any_exists() && !paths.all_exist() {
            return Err(KeystoreError::InvalidKey);
        }

        let mnemonic = mnemonic::load_or_create(&paths.mnemonic, password)?;
        let seed = mnemonic.to_seed("");

        let signing_node = hdkey::derive_path(&seed, &hdkey::signing_path(0));
        let encryption_node = hdkey::derive_path(&seed, &hdkey::encryption_path(0));

        let signing = SigningKey::from_bytes(&signing_node.key);
        let encryption = XStaticSecret::from(encryption_node.key);
        let encryption_public = XPublicKey::from(&encryption);

        if paths.all_exist() {
            Self::verify_on_disk(&paths, &signing, &encryption_public)?;
        } else {
            Self::write_keys(&paths, &signing, &encryption, &encryption_public)?;
        }

        Ok(Self { signing, encryption, encryption_public })
    }

    fn verify_on_disk(
        paths: &KeyPaths,
        signing: &SigningKey,
        encryption_public: &XPublicKey,
    ) -> Result<(), KeystoreError> {
        let on_disk_signing_pub = std::fs::read(&paths.signing_public).map_err(|_| KeystoreError::Io)?;
        let on_disk_encryption_pub = std::fs::read(&paths.encryption_public).map_err(|_| KeystoreError::Io)?;

        if on_disk_signing_pub != signing.verifying_key().as_bytes().as_slice() {
            return Err(KeystoreError::InvalidKey);
        }
        if on_disk_encryption_pub != encryption_public.as_bytes().as_slice() {
            return Err(KeystoreError::InvalidKey);
        }
        Ok(())
    }

    fn write_keys(
        paths: &KeyPaths,
        signing: &SigningKey,
        encryption: &XStaticSecret,
        encryption_public: &XPublicKey,
    ) -> Result<(), KeystoreError> {
        atomic_write_private(&paths.signing_private, signing.to_bytes().as_slice())?;
        atomic_write_private(&paths.signing_public, signing.verifying_key().as_bytes())?;
        atomic_write_private(&paths.encryption_private, &encryption.to_bytes())?;
        atomic_write_private(&paths.encryption_public, encryption_public.as_bytes())?;
        Ok(())
    }

    /// Sign `msg` with the node's Ed25519 signing key.
    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.signing.sign(msg).to_bytes()
    }

    /// Verify an Ed25519 signature against a raw 32-byte public key.
    pub fn verify(pubkey: &[u8; 32], msg: &[u8], sig: &[u8; 64]) -> bool {
        let Ok(vk) = VerifyingKey::from_bytes(pubkey) else { return false };
        let signature = Signature::from_bytes(sig);
        vk.verify(msg, &signature).is_ok()
    }

    /// Raw 32-byte Ed25519 signing public key.
    pub fn signing_public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Raw 32-byte X25519 encryption public key.
    pub fn encryption_public_key(&self) -> [u8; 32] {
        self.encryption_public.to_bytes()
    }

    /// Borrow the X25519 static secret (for ECIES decryption).
    pub fn encryption_secret(&self) -> &XStaticSecret {
        &self.encryption
    }

    /// First 8 bytes of SHA-256(signing public key), hex-encoded.
    pub fn public_key_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.signing.verifying_key().as_bytes());
        hex::encode(&digest[..8])
    }

    /// Export the identity (mnemonic phrase) as an encrypted blob.
    pub fn export_encrypted(&self, mnemonic_phrase: &str, password: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut key = derive_export_key(password, &salt)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| KeystoreError::Crypto)?;
        key.zeroize();

        let mut nonce_bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, mnemonic_phrase.as_bytes())
            .map_err(|_| KeystoreError::Crypto)?;

        let mut out = Vec::with_capacity(32 + 24 + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Import an encrypted identity blob produced by [`Self::export_encrypted`].
    pub fn import_encrypted(blob: &[u8], password: &[u8]) -> Result<String, KeystoreError> {
        if blob.len() < 32 + 24 + 16 {
            return Err(KeystoreError::DecryptionFailed);
        }
        let salt: [u8; 32] = blob[0..32].try_into().unwrap();
        let nonce_bytes = &blob[32..56];
        let ciphertext = &blob[56..];

        let mut key = derive_export_key(password, &salt)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| KeystoreError::Crypto)?;
        key.zeroize();

        let nonce = XNonce::from_slice(nonce_bytes);
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| KeystoreError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| KeystoreError::DecryptionFailed)
    }
}

fn derive_export_key(password: &[u8], salt: &[u8; 32]) -> Result<[u8; 32], KeystoreError> {
    let params = argon2::Params::new(64 * 1024, 3, 4, Some(32)).map_err(|_| KeystoreError::Crypto)?;
    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    let mut out = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|_| KeystoreError::Crypto)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_run_generates_then_second_run_loads_same_identity() {
        let dir = tempdir().unwrap();
        let km1 = KeyManager::load_or_create(dir.path(), Some(b"pw")).unwrap();
        let km2 = KeyManager::load_or_create(dir.path(), Some(b"pw")).unwrap();
        assert_eq!(km1.signing_public_key(), km2.signing_public_key());
        assert_eq!(km1.encryption_public_key(), km2.encryption_public_key());
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let dir = tempdir().unwrap();
        let km = KeyManager::load_or_create(dir.path(), Some(b"pw")).unwrap();
        let sig = km.sign(b"hello sdn");
        assert!(KeyManager::verify(&km.signing_public_key(), b"hello sdn", &sig));
        assert!(!KeyManager::verify(&km.signing_public_key(), b"tampered", &sig));
    }

    #[test]
    fn export_import_roundtrip() {
        let dir = tempdir().unwrap();
        let km = KeyManager::load_or_create(dir.path(), Some(b"pw")).unwrap();
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        let blob = km.export_encrypted(phrase, b"export-pw").unwrap();
        let recovered = KeyManager::import_encrypted(&blob, b"export-pw").unwrap();
        assert_eq!(recovered, phrase);

        let err = KeyManager::import_encrypted(&blob, b"wrong-pw").unwrap_err();
        assert!(matches!(err, KeystoreError::DecryptionFailed));
    }

    #[test]
    fn tampered_on_disk_key_is_rejected_on_reload() {
        let dir = tempdir().unwrap();
        let _km = KeyManager::load_or_create(dir.path(), Some(b"pw")).unwrap();
        let pub_path = dir.path().join("keys").join("signing_public.key");
        let mut bytes = std::fs::read(&pub_path).unwrap();
        bytes[0] ^= 0xff;
        std::fs::write(&pub_path, bytes).unwrap();

        let err = KeyManager::load_or_create(dir.path(), Some(b"pw")).unwrap_err();
        assert!(matches!(err, KeystoreError::InvalidKey));
    }
}
