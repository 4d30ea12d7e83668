use forge_package::ProcessError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Registry login to {registry} failed: {source}")]
    Login {
        registry: String,
        #[source]
        source: ProcessError,
    },

    #[error("Failed to publish {artifact}: {source}")]
    Artifact {
        artifact: String,
        #[source]
        source: Box<PublishError>,
    },

    #[error("Release store error: {0}")]
    Store(String),

    #[error("Unexpected output from {command}: {source}")]
    Output {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown tag strategy '{0}' (expected current-commit or plugin-only)")]
    InvalidStrategy(String),

    #[error("No artifacts were published or skipped")]
    NothingProcessed,
}

impl PublishError {
    pub(crate) fn for_artifact(artifact: &str, source: PublishError) -> Self {
        PublishError::Artifact {
            artifact: artifact.to_string(),
            source: Box::new(source),
        }
    }
}

/// What a publish run did. Each entry is the reference or tag it concerns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub pushed: Vec<String>,
    pub skipped: Vec<String>,
}

impl PublishSummary {
    pub fn pushed_count(&self) -> usize {
        self.pushed.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn merge(&mut self, other: PublishSummary) {
        self.pushed.extend(other.pushed);
        self.skipped.extend(other.skipped);
    }

    /// A run that touched nothing at all is an error
    pub fn finish(self) -> Result<Self, PublishError> {
        if self.pushed.is_empty() && self.skipped.is_empty() {
            Err(PublishError::NothingProcessed)
        } else {
            Ok(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_rejects_empty_run() {
        assert!(matches!(
            PublishSummary::default().finish(),
            Err(PublishError::NothingProcessed)
        ));

        let summary = PublishSummary {
            pushed: vec![],
            skipped: vec!["demo-1.0.0".to_string()],
        };
        assert!(summary.finish().is_ok_and(|s| s.skipped_count() == 1));
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut first = PublishSummary {
            pushed: vec!["a".to_string()],
            skipped: vec![],
        };
        first.merge(PublishSummary {
            pushed: vec!["b".to_string()],
            skipped: vec!["c".to_string()],
        });
        assert_eq!(first.pushed, vec!["a", "b"]);
        assert_eq!(first.skipped_count(), 1);
    }
}
