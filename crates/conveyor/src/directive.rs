use conveyor_types::SkipPattern;
use serde::{Deserialize, Serialize};

/// Whether `message` carries the directive described by `pattern`.
pub fn detect(message: &str, pattern: &SkipPattern) -> bool {
    pattern.is_match(message)
}

/// Pipeline-control directives read from the last commit message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directives {
    pub skip_ci: bool,
    pub skip_cd: bool,
}

impl Directives {
    pub fn from_message(message: &str, ci: &SkipPattern, cd: &SkipPattern) -> Self {
        Self {
            skip_ci: detect(message, ci),
            skip_cd: detect(message, cd),
        }
    }
}
