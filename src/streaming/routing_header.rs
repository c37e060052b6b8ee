// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Length-prefixed TLV codec for the unencrypted routing header that
//! rides alongside every (possibly ECIES-encrypted) payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

const TAG_SCHEMA_TYPE: u8 = 1;
const TAG_DESTINATION_PEER: u8 = 2;
const TAG_TTL: u8 = 3;
const TAG_PRIORITY: u8 = 4;
const TAG_ENCRYPTED: u8 = 5;
const TAG_SESSION_KEY_ID: u8 = 6;

const DEFAULT_TTL: u8 = 7;

/// The unencrypted routing header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingHeader {
    /// The schema name this payload claims to be.
    pub schema_type: String,
    /// Intended destination peer ids (empty = broadcast/gossip).
    pub destination_peers: Vec<String>,
    /// Hop limit; defaults to 7.
    pub ttl: u8,
    /// Delivery priority (higher is more urgent).
    pub priority: u8,
    /// Whether the payload is ECIES-encrypted.
    pub encrypted: bool,
    /// 16-byte session key id, present only under `SessionKey` encryption mode.
    pub session_key_id: Option<[u8; 16]>,
}

impl Default for RoutingHeader {
    fn default() -> Self {
        Self {
            schema_type: String::new(),
            destination_peers: Vec::new(),
            ttl: DEFAULT_TTL,
            priority: 0,
            encrypted: false,
            session_key_id: None,
        }
    }
}

/// Routing header codec errors. Decoding is total — never panics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingHeaderError {
    /// The buffer ended in the middle of a TLV field.
    #[error("truncated")]
    Truncated,
    /// A fixed-size field had the wrong length.
    #[error("invalid field length")]
    InvalidFieldLength,
    /// A string field was not valid UTF-8.
    #[error("invalid utf8")]
    InvalidUtf8,
    /// An unrecognized tag byte was encountered.
    #[error("unknown tag: {0}")]
    UnknownTag(u8),
}

fn put_tlv(buf: &mut BytesMut, tag: u8, value: &[u8]) {
    buf.put_u8(tag);
    buf.put_u16(value.len() as u16);
    buf.put_slice(value);
}

/// Serialize a [`RoutingHeader`] to its TLV wire form.
pub fn encode(header: &RoutingHeader) -> Bytes {
    let mut buf = BytesMut::new();
    put_tlv(&mut buf, TAG_SCHEMA_TYPE, header.schema_type.as_bytes());
    for peer in &header.destination_peers {
        put_tlv(&mut buf, TAG_DESTINATION_PEER, peer.as_bytes());
    }
    put_tlv(&mut buf, TAG_TTL, &[header.ttl]);
    put_tlv(&mut buf, TAG_PRIORITY, &[header.priority]);
    put_tlv(&mut buf, TAG_ENCRYPTED, &[header.encrypted as u8]);
    if let Some(ref id) = header.session_key_id {
        put_tlv(&mut buf, TAG_SESSION_KEY_ID, id);
    }
    buf.freeze()
}

/// Parse a TLV-encoded routing header. Any legal header round-trips
/// losslessly through [`encode`]/[`decode`].
pub fn decode(mut bytes: &[u8]) -> Result<RoutingHeader, RoutingHeaderError> {
    let mut header = RoutingHeader { ttl: 0, ..RoutingHeader::default() };
    let mut saw_ttl = false;
    let mut saw_priority = false;

    while !bytes.is_empty() {
        if bytes.len() < 3 {
            return Err(RoutingHeaderError::Truncated);
        }
        let tag = bytes.get_u8();
        let len = bytes.get_u16() as usize;
        if bytes.len() < len {
            return Err(RoutingHeaderError::Truncated);
        }
        let (value, rest) = bytes.split_at(len);
        bytes = rest;

        match tag {
            TAG_SCHEMA_TYPE => {
                header.schema_type = std::str::from_utf8(value).map_err(|_| RoutingHeaderError::InvalidUtf8)?.to_string();
            }
            TAG_DESTINATION_PEER => {
                header
                    .destination_peers
                    .push(std::str::from_utf8(value).map_err(|_| RoutingHeaderError::InvalidUtf8)?.to_string());
            }
            TAG_TTL => {
                if value.len() != 1 {
                    return Err(RoutingHeaderError::InvalidFieldLength);
                }
                header.ttl = value[0];
                saw_ttl = true;
            }
            TAG_PRIORITY => {
                if value.len() != 1 {
                    return Err(RoutingHeaderError::InvalidFieldLength);
                }
                header.priority = value[0];
                saw_priority = true;
            }
            TAG_ENCRYPTED => {
                if value.len() != 1 {
                    return Err(RoutingHeaderError::InvalidFieldLength);
                }
                header.encrypted = value[0] != 0;
            }
            TAG_SESSION_KEY_ID => {
                if value.len() != 16 {
                    return Err(RoutingHeaderError::InvalidFieldLength);
                }
                let mut id = [0u8; 16];
                id.copy_from_slice(value);
                header.session_key_id = Some(id);
            }
            other => return Err(RoutingHeaderError::UnknownTag(other)),
        }
    }

    if !saw_ttl {
        header.ttl = DEFAULT_TTL;
    }
    if !saw_priority {
        header.priority = 0;
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_all_fields() {
        let header = RoutingHeader {
            schema_type: "conjunction.json".to_string(),
            destination_peers: vec!["peer-a".to_string(), "peer-b".to_string()],
            ttl: 4,
            priority: 9,
            encrypted: true,
            session_key_id: Some([7u8; 16]),
        };
        let bytes = encode(&header);
        assert_eq!(decode(&bytes).unwrap(), header);
    }

    #[test]
    fn roundtrip_without_optional_session_key() {
        let header = RoutingHeader {
            schema_type: "manifest.json".to_string(),
            destination_peers: vec![],
            ttl: 7,
            priority: 0,
            encrypted: false,
            session_key_id: None,
        };
        let bytes = encode(&header);
        assert_eq!(decode(&bytes).unwrap(), header);
    }

    #[test]
    fn decode_rejects_truncated_input_without_panicking() {
        let header = RoutingHeader { schema_type: "x".to_string(), ..RoutingHeader::default() };
        let bytes = encode(&header);
        for cut in 0..bytes.len() {
            let _ = decode(&bytes[..cut]);
        }
        assert_eq!(decode(&bytes[..1]), Err(RoutingHeaderError::Truncated));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let mut buf = BytesMut::new();
        put_tlv(&mut buf, 99, b"x");
        assert_eq!(decode(&buf), Err(RoutingHeaderError::UnknownTag(99)));
    }
}
