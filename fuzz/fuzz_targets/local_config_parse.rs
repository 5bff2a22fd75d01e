#![no_main]

use conveyor::merge::overlay_local;
use conveyor_config::{LocalPipelineConfig, PipelineConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(local) = toml::from_str::<LocalPipelineConfig>(text) else {
        return;
    };

    let global = PipelineConfig {
        release_actor_whitelist: vec!["admin".to_string()],
        npm_ignore_dist_tags: vec!["latest".to_string()],
        ..PipelineConfig::default()
    };
    let merged = overlay_local(global.clone(), local);

    assert_eq!(merged.release_actor_whitelist, global.release_actor_whitelist);
    assert_eq!(merged.release_repo_owner_whitelist, global.release_repo_owner_whitelist);
    assert_eq!(merged.automerge_actor_whitelist, global.automerge_actor_whitelist);
    assert_eq!(merged.npm_ignore_dist_tags, global.npm_ignore_dist_tags);
    assert_eq!(merged.can_retry_automerge, global.can_retry_automerge);
});
