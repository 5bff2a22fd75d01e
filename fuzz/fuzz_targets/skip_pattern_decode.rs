#![no_main]

use conveyor_types::SkipPattern;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(pattern) = serde_json::from_slice::<SkipPattern>(data) else {
        return;
    };

    let encoded = serde_json::to_string(&pattern).expect("serialize pattern");
    let decoded: SkipPattern = serde_json::from_str(&encoded).expect("re-decode pattern");
    assert_eq!(pattern, decoded);

    for probe in ["[skip ci]", "[SKIP CD]", "", "chore: release"] {
        assert_eq!(pattern.is_match(probe), decoded.is_match(probe));
    }
});
