// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Append-only, hash-linked audit log (C7).

pub mod log;

pub use log::{AuditEntry, AuditLog, AuditLogError, Severity};

/// Audit event taxonomy (spec.md §6): string constants, schema-stable.
pub mod event_types {
    /// Administrative login.
    pub const ADMIN_LOGIN: &str = "admin.login";
    /// Administrative logout.
    pub const ADMIN_LOGOUT: &str = "admin.logout";
    /// Administrative account creation.
    pub const ADMIN_CREATE: &str = "admin.create";
    /// Administrative password change.
    pub const ADMIN_PASSWORD_CHANGE: &str = "admin.password_change";
    /// TOTP enabled for an administrative account.
    pub const ADMIN_TOTP_ENABLE: &str = "admin.totp_enable";
    /// TOTP disabled for an administrative account.
    pub const ADMIN_TOTP_DISABLE: &str = "admin.totp_disable";
    /// A session was forcibly revoked.
    pub const ADMIN_SESSION_REVOKE: &str = "admin.session_revoke";
    /// A peer's trust level changed.
    pub const PEER_TRUST_CHANGE: &str = "peer.trust_change";
    /// A peer entry was added.
    pub const PEER_ADD: &str = "peer.add";
    /// A peer entry was removed.
    pub const PEER_REMOVE: &str = "peer.remove";
    /// Node configuration changed.
    pub const CONFIG_CHANGE: &str = "config.change";
    /// A new identity key was generated.
    pub const KEY_GENERATE: &str = "key.generate";
    /// The identity was exported.
    pub const KEY_BACKUP: &str = "key.backup";
    /// The identity was imported/restored.
    pub const KEY_RESTORE: &str = "key.restore";
    /// First-run setup started.
    pub const SETUP_START: &str = "setup.start";
    /// First-run setup completed.
    pub const SETUP_COMPLETE: &str = "setup.complete";
    /// The node process started.
    pub const SERVER_START: &str = "server.start";
    /// The node process is stopping.
    pub const SERVER_STOP: &str = "server.stop";
}
