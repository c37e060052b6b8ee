// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding must be total: never panic, regardless of byte garbage.
    let _ = sdn_node::streaming::routing_header::decode(data);
});
