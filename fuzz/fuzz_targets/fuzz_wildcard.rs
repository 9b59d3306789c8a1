#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Malformed patterns must be rejected, never panic
    if let Ok(pattern) = xftx::query::WildcardPattern::parse(data) {
        let _ = pattern.matches(data.as_bytes());
        assert!(pattern.max_len().map_or(true, |max| pattern.min_len() <= max));
    }
});
