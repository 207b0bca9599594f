// src/error.rs
use thiserror::Error;

/// Everything that can go wrong while checking one source.
///
/// None of these abort a run: the coordinator attributes each one to its
/// source and moves on.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("retrieval failed for {locator}: {reason}")]
    RetrievalFailed { locator: String, reason: String },

    #[error("no matching item found ({strategy})")]
    ExtractionFailed { strategy: &'static str },

    #[error("notification transport not configured: missing {0}")]
    ConfigurationMissing(String),

    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("state store I/O failed for key {key}: {source}")]
    StoreIoFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl CheckError {
    /// Stable label for logs, metrics and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::RetrievalFailed { .. } => "retrieval_failed",
            CheckError::ExtractionFailed { .. } => "extraction_failed",
            CheckError::ConfigurationMissing(_) => "configuration_missing",
            CheckError::DeliveryFailed(_) => "delivery_failed",
            CheckError::StoreIoFailed { .. } => "store_io_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_snake_case_labels() {
        let errs = [
            CheckError::RetrievalFailed {
                locator: "u".into(),
                reason: "timeout".into(),
            },
            CheckError::ExtractionFailed {
                strategy: "prefix_first_match",
            },
            CheckError::ConfigurationMissing("TO_EMAIL".into()),
            CheckError::DeliveryFailed("boom".into()),
            CheckError::StoreIoFailed {
                key: "k".into(),
                source: std::io::Error::other("disk"),
            },
        ];
        let kinds: std::collections::BTreeSet<_> = errs.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errs.len());
        assert!(kinds.iter().all(|k| k.chars().all(|c| c.is_ascii_lowercase() || c == '_')));
    }

    #[test]
    fn display_names_missing_variables() {
        let e = CheckError::ConfigurationMissing("TO_EMAIL, APP_PASSWORD".into());
        assert!(e.to_string().contains("TO_EMAIL, APP_PASSWORD"));
    }
}
