#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);

    // The call parser must accept any text without panicking.
    let parsed = seed_purity::call::parse_call(&input);

    // Malformed input always degrades to a failed call.
    if parsed.malformed {
        assert!(!parsed.call.is_valid(), "malformed token parsed as valid");
    }
    if let Some(dosage) = parsed.call.dosage() {
        assert!((0.0..=3.0).contains(&dosage), "dosage out of range");
    }
    let _ = parsed.call.to_string();
});
