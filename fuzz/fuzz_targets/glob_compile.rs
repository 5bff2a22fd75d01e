#![no_main]

use conveyor_glob::Glob;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // first line is the pattern, the rest are candidates
    let mut lines = text.lines();
    let Some(pattern) = lines.next() else {
        return;
    };

    if let Ok(glob) = Glob::new(pattern) {
        assert_eq!(glob.as_str(), pattern);
        for candidate in lines {
            let _ = glob.is_match(candidate);
        }
    }
});
