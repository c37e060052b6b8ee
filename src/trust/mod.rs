// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Peer trust registry and trust-scaled rate limiting (C4).

pub mod rate_limit;
pub mod registry;

pub use rate_limit::PeerRateLimiter;
pub use registry::{PeerTrustEntry, TrustLevel, TrustRegistry, TrustRegistryError};
