// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Session authentication (C3): an Ed25519 challenge/response handshake
//! binding an xpub identity to an HTTP cookie session.

pub mod challenge;
pub mod routes;
pub mod session;

pub use challenge::{Challenge, ChallengeError, ChallengeStore};
pub use session::{Session, SessionError, SessionStore};
