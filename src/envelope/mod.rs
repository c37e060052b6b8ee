// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! ECIES-style hybrid envelope encryption (C6) over X25519, secp256k1,
//! and P-256, keyed from the recipient's long-term public key.

pub mod ecies;

pub use ecies::{Algorithm, EciesEnvelope, EnvelopeError};
