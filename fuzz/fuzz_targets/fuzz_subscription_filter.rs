// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use sdn_node::streaming::filter::{evaluate_filters, FieldFilter};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let split = data[0] as usize % (data.len().max(1));
    let (filters_bytes, data_bytes) = data[1..].split_at(split.min(data.len().saturating_sub(1)));

    let Ok(filters_str) = std::str::from_utf8(filters_bytes) else { return };
    let Ok(data_str) = std::str::from_utf8(data_bytes) else { return };

    let Ok(filters) = serde_json::from_str::<Vec<FieldFilter>>(filters_str) else { return };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(data_str) else { return };

    // Must never panic regardless of filter/path/value shape.
    let _ = evaluate_filters(&filters, &value);
});
