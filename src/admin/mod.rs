// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Admin HTTP composition root: mounts the session-auth and plugin
//! routers behind one `axum::Router`, plus ambient `/healthz` and
//! `/metrics` scrape endpoints — the external surface of a running node.

pub mod server;

pub use server::{build_router, AllowAllCapabilityVerifier, SessionCapabilityVerifier};
