// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Node configuration: defaults per spec, loaded from TOML and
//! overridable by environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn env_override(key: &str, current: &mut String) {
    if let Ok(v) = std::env::var(key) {
        if !v.trim().is_empty() {
            *current = v;
        }
    }
}

fn env_override_bool(key: &str, current: &mut bool) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(b) = v.trim().parse::<bool>() {
            *current = b;
        }
    }
}

fn env_override_u64(key: &str, current: &mut u64) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(n) = v.trim().parse::<u64>() {
            *current = n;
        }
    }
}

/// Node operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMode {
    /// Full node: all eight core components active.
    Full,
    /// Edge node: reduced surface (no plugin hosting, admin-optional).
    Edge,
}

impl Default for NodeMode {
    fn default() -> Self {
        NodeMode::Full
    }
}

/// Network-layer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Listen multiaddrs.
    #[serde(default = "default_listen")]
    pub listen: Vec<String>,
    /// Per-peer message rate limit (messages/second).
    #[serde(default = "default_max_msg_per_sec")]
    pub max_messages_per_second: u32,
    /// Per-peer message rate limit (messages/minute).
    #[serde(default = "default_max_msg_per_min")]
    pub max_messages_per_minute: u32,
    /// Token-bucket burst size.
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
}

fn default_listen() -> Vec<String> {
    vec!["/ip4/0.0.0.0/tcp/4001".to_string()]
}
fn default_max_msg_per_sec() -> u32 {
    100
}
fn default_max_msg_per_min() -> u32 {
    1000
}
fn default_rate_limit_burst() -> u32 {
    50
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_messages_per_second: default_max_msg_per_sec(),
            max_messages_per_minute: default_max_msg_per_min(),
            rate_limit_burst: default_rate_limit_burst(),
        }
    }
}

/// Storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for keys, peer/audit stores, and plugin bundles.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "~/.sdn/data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

impl StorageConfig {
    /// Resolve `path`, expanding a leading `~` against `$HOME`.
    pub fn resolved_path(&self) -> std::path::PathBuf {
        if let Some(rest) = self.path.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        std::path::PathBuf::from(&self.path)
    }
}

fn dirs_home() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME").map(std::path::PathBuf::from)
}

/// Admin HTTP surface settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Whether the admin HTTP surface is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Listen address, e.g. `127.0.0.1:5001`.
    #[serde(default = "default_admin_listen")]
    pub listen_addr: String,
    /// Whether protected routes require an authenticated session.
    #[serde(default = "default_true")]
    pub require_auth: bool,
    /// Session TTL in seconds (default 24h).
    #[serde(default = "default_session_expiry_secs")]
    pub session_expiry_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_admin_listen() -> String {
    "127.0.0.1:5001".to_string()
}
fn default_session_expiry_secs() -> u64 {
    24 * 60 * 60
}

impl AdminConfig {
    /// Session TTL as a `Duration`.
    pub fn session_expiry(&self) -> Duration {
        Duration::from_secs(self.session_expiry_secs)
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: default_admin_listen(),
            require_auth: true,
            session_expiry_secs: default_session_expiry_secs(),
        }
    }
}

/// Peer trust settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeersConfig {
    /// Strict mode: unknown peers classify as `Untrusted` and are denied.
    #[serde(default)]
    pub strict_mode: bool,
    /// Addresses seeded as `Trusted` at startup.
    #[serde(default)]
    pub trusted_peers: Vec<String>,
    /// Whether rate limits scale by trust level.
    #[serde(default = "default_true")]
    pub trust_based_rate_limiting: bool,
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            trusted_peers: Vec::new(),
            trust_based_rate_limiting: true,
        }
    }
}

/// Root node configuration (spec.md Section 6).
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Node operating mode.
    #[serde(default)]
    pub mode: NodeMode,
    /// Networking settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Admin HTTP settings.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Peer trust settings.
    #[serde(default)]
    pub peers: PeersConfig,
}

impl NodeConfig {
    /// Load from a TOML file, falling back to defaults for a missing file,
    /// then apply the documented environment variable overrides.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut cfg = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            NodeConfig::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        env_override("SDN_STORAGE_PATH", &mut self.storage.path);
        env_override("SDN_ADMIN_LISTEN_ADDR", &mut self.admin.listen_addr);
        env_override_bool("SDN_ADMIN_ENABLED", &mut self.admin.enabled);
        env_override_bool("SDN_ADMIN_REQUIRE_AUTH", &mut self.admin.require_auth);
        env_override_bool("SDN_PEERS_STRICT_MODE", &mut self.peers.strict_mode);
        env_override_u64("SDN_ADMIN_SESSION_EXPIRY_SECS", &mut self.admin.session_expiry_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.mode, NodeMode::Full);
        assert_eq!(cfg.admin.listen_addr, "127.0.0.1:5001");
        assert!(cfg.admin.require_auth);
        assert!(!cfg.peers.strict_mode);
        assert!(cfg.peers.trust_based_rate_limiting);
        assert_eq!(cfg.network.max_messages_per_second, 100);
        assert_eq!(cfg.network.max_messages_per_minute, 1000);
        assert_eq!(cfg.network.rate_limit_burst, 50);
        assert_eq!(cfg.admin.session_expiry(), Duration::from_secs(86_400));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = NodeConfig::load(std::path::Path::new("/nonexistent/sdn.toml")).unwrap();
        assert_eq!(cfg.storage.path, "~/.sdn/data");
    }
}
