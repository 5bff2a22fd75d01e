#![no_main]

use conveyor_registry::{claimed_tags, reconcile};
use conveyor_types::BranchReleaseEntry;
use libfuzzer_sys::fuzz_target;

// Input: three blank-line separated sections of patterns, branches and tags.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut sections = text.split("\n\n").map(|s| {
        s.lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });
    let patterns = sections.next().unwrap_or_default();
    let branches = sections.next().unwrap_or_default();
    let tags = sections.next().unwrap_or_default();
    let ignore = vec!["latest".to_string()];

    let config: Vec<BranchReleaseEntry> = patterns.into_iter().map(BranchReleaseEntry::Pattern).collect();
    let Ok(stale) = reconcile(&config, &branches, &tags, &ignore) else {
        return;
    };

    let claimed = claimed_tags(&config, &branches).expect("compiled once already");
    for tag in &stale {
        assert!(tags.contains(tag));
        assert!(!ignore.contains(tag));
        assert!(!claimed.contains(tag));
    }
    let again = reconcile(&config, &branches, &stale, &ignore).expect("compiled once already");
    assert_eq!(again, stale);
});
