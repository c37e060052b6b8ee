// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Bundle key parsing: a plugin's symmetric key file is accepted in any
//! of three shapes — raw 32 bytes, hex, or base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Bundle key parse errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginKeyError {
    /// The key file content did not decode to exactly 32 bytes under any
    /// of the accepted encodings.
    #[error("key material is not a valid 32-byte key")]
    Invalid,
}

fn is_hex_32(s: &str) -> Option<[u8; 32]> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    if stripped.len() != 64 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = hex::decode(stripped).ok()?;
    bytes.try_into().ok()
}

/// Parse a plugin bundle key file's raw bytes: accepted as raw 32
/// bytes, `0x`-prefixed or bare 64-char hex, or base64 decoding to 32
/// bytes. Any other shape is rejected.
pub fn parse_plugin_key(raw: &[u8]) -> Result<[u8; 32], PluginKeyError> {
    if raw.len() == 32 {
        return Ok(raw.try_into().expect("length checked above"));
    }

    if let Ok(text) = std::str::from_utf8(raw) {
        let trimmed = text.trim();
        if let Some(key) = is_hex_32(trimmed) {
            return Ok(key);
        }
        if let Ok(decoded) = STANDARD.decode(trimmed) {
            if let Ok(key) = decoded.try_into() {
                return Ok(key);
            }
        }
    }

    Err(PluginKeyError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_raw_32_bytes() {
        let raw = [7u8; 32];
        assert_eq!(parse_plugin_key(&raw).unwrap(), raw);
    }

    #[test]
    fn accepts_hex_with_and_without_prefix() {
        let key = [9u8; 32];
        let hex_str = hex::encode(key);
        assert_eq!(parse_plugin_key(hex_str.as_bytes()).unwrap(), key);
        let prefixed = format!("0x{hex_str}");
        assert_eq!(parse_plugin_key(prefixed.as_bytes()).unwrap(), key);
    }

    #[test]
    fn accepts_base64() {
        let key = [3u8; 32];
        let encoded = STANDARD.encode(key);
        assert_eq!(parse_plugin_key(encoded.as_bytes()).unwrap(), key);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(parse_plugin_key(b"too short").unwrap_err(), PluginKeyError::Invalid);
    }
}
