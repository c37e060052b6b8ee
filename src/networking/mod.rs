#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: libp2p transport and the signed peer registry.

pub mod p2p;
pub mod p2p_identity;
pub mod peer_registry;
