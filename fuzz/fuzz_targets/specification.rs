#![no_main]

use libfuzzer_sys::fuzz_target;
use vivify::{desugar::MultiApiLevelSpecification, metadata::apilevel::AndroidApiLevel};

fuzz_target!(|data: &[u8]| {
    if let Ok(multi) = MultiApiLevelSpecification::from_json_bytes(data) {
        let _ = multi.for_compilation(AndroidApiLevel::L, false);
        let _ = multi.for_compilation(AndroidApiLevel::L, true);
    }
});
