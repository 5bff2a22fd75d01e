#![no_main]

use conveyor_types::Metadata;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(md) = serde_json::from_slice::<Metadata>(data) else {
        return;
    };

    // whatever decodes must survive a trip through the artifact format
    let encoded = serde_json::to_vec(&md).expect("serialize decoded metadata");
    let decoded: Metadata = serde_json::from_slice(&encoded).expect("re-decode metadata");
    assert_eq!(md, decoded);
    assert_eq!(
        md.ci_skip_regex.is_match("[skip ci]"),
        decoded.ci_skip_regex.is_match("[skip ci]")
    );
});
