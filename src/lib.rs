// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Space Data Network node core.
//!
//! This crate provides the load-bearing parts of an SDN peer: identity and
//! trust, the subscription/streaming bus, end-to-end envelope encryption, a
//! tamper-evident audit log, and the plugin key-envelope service. The
//! underlying P2P transport, DHT/gossip, record storage, and schema
//! (de)serialization are external collaborators with fixed interfaces;
//! `networking` carries only the minimal transport boundary this crate
//! drives directly.

/// Node configuration: layered TOML + environment, with the defaults
/// every component falls back to.
pub mod config;
/// Canonical encoding helpers shared by the durable stores.
pub mod codec;
/// Identity & trust: deterministic key derivation, at-rest mnemonic
/// encryption, and the Base58Check extended-public-key codec (C1/C2).
pub mod identity;
/// Peer trust registry: tiered trust levels, admission, and trust-scaled
/// rate limiting (C4).
pub mod trust;
/// Session authentication: Ed25519 challenge/response bound to a cookie
/// session (C3).
pub mod auth;
/// Subscription & streaming core: filtered pub/sub delivery in single,
/// streaming, and batch modes (C5).
pub mod streaming;
/// ECIES-style hybrid envelope encryption over multiple curves (C6).
pub mod envelope;
/// Append-only, hash-linked audit log (C7).
pub mod audit;
/// Plugin bundle catalog and per-request key-envelope service (C8).
pub mod plugins;
/// P2P networking stack: persistent libp2p identity and the gossip
/// transport boundary the core drives.
pub mod networking;
/// Observability: Prometheus metrics registry.
pub mod monitoring;
/// Admin HTTP surface composition (auth + plugin routes + ops endpoints).
pub mod admin;
