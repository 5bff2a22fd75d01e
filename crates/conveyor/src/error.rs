use conveyor_config::LoadError;
use conveyor_retry::RetryExceeded;

/// Failures that terminate a pipeline invocation.
///
/// Travels inside `anyhow::Error`; recover it with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("missing required option `{0}`")]
    MissingRequiredOption(&'static str),

    #[error("failed to load global pipeline config")]
    GlobalConfig(#[source] LoadError),

    #[error(transparent)]
    ConfigLoad(#[from] LoadError),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    RetryExceeded(RetryExceeded<anyhow::Error>),

    #[error("one or more {operation} operations failed: {detail}")]
    PartialFailure { operation: String, detail: String },

    #[error("{0}")]
    ArtifactUnavailable(String),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn missing_option_names_the_option() {
        let err = PipelineError::MissingRequiredOption("githubToken");
        insta::assert_snapshot!(err.to_string(), @"missing required option `githubToken`");
    }

    #[test]
    fn config_load_errors_stay_distinct() {
        let not_found: PipelineError = LoadError::NotFound {
            resource: "package.json".to_string(),
        }
        .into();
        let import: PipelineError = LoadError::Import {
            resource: "package.json".to_string(),
            reason: "expected value".to_string(),
        }
        .into();

        assert!(not_found.to_string().contains("could not find"));
        assert!(import.to_string().contains("failed to import"));
    }

    #[test]
    fn global_config_failure_keeps_cause() {
        let err = anyhow::Error::new(PipelineError::GlobalConfig(LoadError::Fetch {
            resource: "https://example.invalid/config.json".to_string(),
            reason: "connection refused".to_string(),
        }));
        let rendered = format!("{err:#}");
        assert!(rendered.starts_with("failed to load global pipeline config"));
        assert!(rendered.contains("connection refused"));
    }

    #[test]
    fn retry_exceeded_renders_unable_to() {
        let err = PipelineError::RetryExceeded(RetryExceeded {
            operation: "install".to_string(),
            attempts: 2,
            elapsed: Duration::from_secs(3),
            last_error: anyhow::anyhow!("E404"),
        });
        assert_eq!(err.to_string(), "unable to install after 2 attempt(s) over 3s: E404");
    }

    #[test]
    fn partial_failure_says_one_or_more() {
        let err = PipelineError::PartialFailure {
            operation: "cleanup".to_string(),
            detail: "failed to write npm token".to_string(),
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"one or more cleanup operations failed: failed to write npm token"
        );
    }
}
