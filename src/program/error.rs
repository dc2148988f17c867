use thiserror::Error;

/// Failure raised by a [`UsageCollector`](super::UsageCollector) pass.
///
/// Carries a human-readable reason and, when the failure wraps a lower-level
/// error, the original error as its source.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct CollectionError {
    reason: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CollectionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn with_source(
        reason: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }
}

impl From<std::io::Error> for CollectionError {
    fn from(err: std::io::Error) -> Self {
        let reason = err.to_string();
        Self {
            reason,
            source: Some(Box::new(err)),
        }
    }
}
