// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Plugin bundle catalog and per-request key-envelope service (C8).

pub mod catalog;
pub mod envelope;
pub mod key;
pub mod routes;

pub use catalog::{CatalogError, PluginAsset, PluginCatalog};
pub use envelope::{build as build_envelope, CapabilityClaims, EnvelopeBuildError, PluginEnvelope};
pub use key::{parse_plugin_key, PluginKeyError};
pub use routes::{CapabilityVerifier, PluginState};
