//!
//! src/errors.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Defines enums and methods of error conversion
//! for errors the harvester and reconciler use
//!
//!

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("rate limited (status {status:?}): {message}")]
    RateLimited { status: Option<u16>, retry_after: Option<Duration>, message: String },
    #[error("source unavailable (status {status:?}): {message}")]
    SourceUnavailable { status: Option<u16>, message: String },
    #[error("transient failure (status {status:?}): {message}")]
    UnclassifiedTransient { status: Option<u16>, message: String },
    #[error("retry budget exhausted for {item} after {attempts} attempts")]
    RetryBudgetExhausted { item: String, attempts: u32 },
    #[error("row dropped during reconciliation: {0}")]
    ReconciliationType(String),
    #[error("harvest pass produced no records")]
    EmptyResult,
    #[error("parse error: {0}")]
    Parse(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl HarvestError {
    /// Upstream status code behind a transient failure, if one was reported
    pub fn status(&self) -> Option<u16> {
        match self {
            HarvestError::RateLimited { status, .. }
            | HarvestError::SourceUnavailable { status, .. }
            | HarvestError::UnclassifiedTransient { status, .. } => *status,
            _ => None
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvestError::RateLimited { .. }
                | HarvestError::SourceUnavailable { .. }
                | HarvestError::UnclassifiedTransient { .. }
        )
    }
}

impl From<reqwest::Error> for HarvestError {
    fn from(e: reqwest::Error) -> Self { HarvestError::Http(e.to_string()) }
}

impl From<serde_json::Error> for HarvestError {
    fn from(e: serde_json::Error) -> Self { HarvestError::Parse(e.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_variants_are_retryable() {
        let limited = HarvestError::RateLimited {
            status: Some(429), retry_after: None, message: "slow down".into()
        };
        assert!(limited.is_retryable());
        assert_eq!(limited.status(), Some(429));

        let exhausted = HarvestError::RetryBudgetExhausted {
            item: "p1".into(), attempts: 11
        };
        assert!(!exhausted.is_retryable());
        assert_eq!(exhausted.status(), None);
        assert!(!HarvestError::EmptyResult.is_retryable());
    }
}
