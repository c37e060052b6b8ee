// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Node identity: deterministic key derivation, at-rest mnemonic
//! encryption, and signing/verification (C1), plus the Base58Check
//! extended-public-key codec consumers use to address this node (C2).

mod hdkey;
pub mod keystore;
pub mod mnemonic;
pub mod xpub;

pub use keystore::{KeyManager, KeystoreError};
pub use xpub::{parse as parse_xpub, serialize as serialize_xpub, XpubError};
