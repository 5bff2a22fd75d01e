use std::env;
use std::fmt;

use conveyor_types::Metadata;

use crate::reporter::Reporter;

/// Process-level debug signal.
pub const DEBUG_ENV: &str = "DEBUG";

/// Non-fatal findings surfaced to the operator as warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    NoLocalConfig,
    NoReleaseConfig,
    NoBuildDocs,
    NoCoverageUpload,
    DebugMode { signal: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::NoLocalConfig => f.write_str("no local pipeline config loaded"),
            Advisory::NoReleaseConfig => f.write_str("no release config loaded"),
            Advisory::NoBuildDocs => {
                f.write_str("no `build-docs` script defined in package.json; docs will not be built")
            }
            Advisory::NoCoverageUpload => f.write_str(
                "no code coverage upload: coverage uploads are disabled by the pipeline config",
            ),
            Advisory::DebugMode { signal } => {
                write!(f, "PIPELINE IS RUNNING IN DEBUG MODE ({signal})")
            }
        }
    }
}

impl Advisory {
    /// Capability gaps visible in a resolved record.
    pub fn capability_gaps(metadata: &Metadata) -> Vec<Advisory> {
        let mut gaps = Vec::new();
        if !metadata.has_docs {
            gaps.push(Advisory::NoBuildDocs);
        }
        if !metadata.can_upload_coverage {
            gaps.push(Advisory::NoCoverageUpload);
        }
        gaps
    }

    /// Advisories that can be recomputed from a stored record.
    ///
    /// Whether local config was present is not recorded, so that advisory is
    /// never part of the result.
    pub fn from_metadata(metadata: &Metadata) -> Vec<Advisory> {
        let mut advisories = Vec::new();
        if metadata.release_branch_config.is_empty() {
            advisories.push(Advisory::NoReleaseConfig);
        }
        advisories.extend(Self::capability_gaps(metadata));
        advisories
    }
}

/// The active debug signal: an explicit debug string, else `$DEBUG`.
pub fn debug_signal(debug_string: Option<&str>) -> Option<String> {
    debug_string
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| env::var(DEBUG_ENV).ok().filter(|s| !s.is_empty()))
}

pub(crate) fn emit(reporter: &mut dyn Reporter, advisories: &[Advisory]) {
    for advisory in advisories {
        reporter.warn(&advisory.to_string());
    }
}

/// Re-issue `advisories` plus a debug-mode warning when forced and a debug
/// signal is present. Returns whether anything was emitted.
pub(crate) fn reissue_for_debug(
    reporter: &mut dyn Reporter,
    advisories: &[Advisory],
    debug_string: Option<&str>,
    force_warnings: bool,
) -> bool {
    if !force_warnings {
        return false;
    }
    let Some(signal) = debug_signal(debug_string) else {
        return false;
    };

    emit(reporter, advisories);
    emit(reporter, &[Advisory::DebugMode { signal }]);
    true
}

#[cfg(test)]
mod tests {
    use conveyor_config::PipelineConfig;
    use conveyor_types::BranchReleaseEntry;
    use serial_test::serial;

    use super::*;
    use crate::directive::Directives;
    use crate::merge::base_metadata;

    #[derive(Default)]
    struct CollectingReporter {
        infos: Vec<String>,
        warns: Vec<String>,
        errors: Vec<String>,
    }

    impl Reporter for CollectingReporter {
        fn info(&mut self, msg: &str) {
            self.infos.push(msg.to_string());
        }

        fn warn(&mut self, msg: &str) {
            self.warns.push(msg.to_string());
        }

        fn error(&mut self, msg: &str) {
            self.errors.push(msg.to_string());
        }
    }

    fn metadata() -> Metadata {
        base_metadata(&PipelineConfig::default(), Directives::default())
    }

    #[test]
    fn messages_name_the_missing_capability() {
        assert!(Advisory::NoBuildDocs.to_string().contains("build-docs"));
        assert!(Advisory::NoCoverageUpload.to_string().contains("code coverage"));
        assert!(Advisory::NoReleaseConfig.to_string().contains("release config"));
        assert_eq!(Advisory::NoLocalConfig.to_string(), "no local pipeline config loaded");
        insta::assert_snapshot!(
            Advisory::DebugMode { signal: "conveyor:*".to_string() }.to_string(),
            @"PIPELINE IS RUNNING IN DEBUG MODE (conveyor:*)"
        );
    }

    #[test]
    fn gaps_follow_metadata() {
        let mut md = metadata();
        md.can_upload_coverage = false;
        assert_eq!(
            Advisory::capability_gaps(&md),
            vec![Advisory::NoBuildDocs, Advisory::NoCoverageUpload]
        );

        md.has_docs = true;
        md.can_upload_coverage = true;
        md.release_branch_config = vec![BranchReleaseEntry::from("main")];
        assert!(Advisory::from_metadata(&md).is_empty());
    }

    #[test]
    #[serial]
    fn explicit_debug_string_wins() {
        temp_env::with_var(DEBUG_ENV, Some("from-env"), || {
            assert_eq!(debug_signal(Some("explicit")).as_deref(), Some("explicit"));
            assert_eq!(debug_signal(Some("")).as_deref(), Some("from-env"));
            assert_eq!(debug_signal(None).as_deref(), Some("from-env"));
        });
    }

    #[test]
    #[serial]
    fn no_signal_without_string_or_env() {
        temp_env::with_var_unset(DEBUG_ENV, || {
            assert_eq!(debug_signal(None), None);
        });
    }

    #[test]
    #[serial]
    fn reissue_requires_force_and_signal() {
        temp_env::with_var_unset(DEBUG_ENV, || {
            let advisories = Advisory::from_metadata(&metadata());

            let mut reporter = CollectingReporter::default();
            assert!(!reissue_for_debug(&mut reporter, &advisories, Some("dbg"), false));
            assert!(!reissue_for_debug(&mut reporter, &advisories, None, true));
            assert!(reporter.warns.is_empty());

            assert!(reissue_for_debug(&mut reporter, &advisories, Some("dbg"), true));
            assert_eq!(reporter.warns.len(), advisories.len() + 1);
            assert!(reporter.warns.last().is_some_and(|w| w.contains("DEBUG MODE") && w.contains("dbg")));
            assert!(reporter.infos.is_empty());
            assert!(reporter.errors.is_empty());
        });
    }
}
