//!
//! src/backoff.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Classifies failed fetches into the transient taxonomy and maps each
//! class to the fixed cooldown its credential must sit out
//!

use std::time::Duration;

use crate::config::CooldownConfig;
use crate::errors::HarvestError;

/// What a catalog client reports when a fetch did not yield records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub status: Option<u16>,
    pub retry_after: Option<Duration>,
    pub message: String
}

impl FetchFailure {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), retry_after: None, message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self { status: None, retry_after: None, message: message.into() }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            retry_after: None,
            message: e.to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    cooldowns: CooldownConfig,
    retry_budget: u32
}

impl BackoffPolicy {
    pub fn new(cooldowns: CooldownConfig, retry_budget: u32) -> Self {
        Self { cooldowns, retry_budget }
    }

    /// Retries allowed per work item, handed to each item's loop by value
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// Every failure is transient; only the budget ends an item
    pub fn classify(&self, failure: FetchFailure) -> HarvestError {
        let FetchFailure { status, retry_after, message } = failure;
        match status {
            Some(429) => HarvestError::RateLimited { status, retry_after, message },
            Some(404) | Some(500) => HarvestError::SourceUnavailable { status, message },
            _ => HarvestError::UnclassifiedTransient { status, message }
        }
    }

    pub fn cooldown(&self, error: &HarvestError) -> Duration {
        match error {
            HarvestError::RateLimited { retry_after, .. } =>
                retry_after.unwrap_or(self.cooldowns.rate_limited),
            HarvestError::SourceUnavailable { .. } => self.cooldowns.unavailable,
            _ => self.cooldowns.unclassified
        }
    }
}

/// Counts retries for one work item; never shared across items or workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
    attempts: u32
}

impl RetryBudget {
    pub fn new(retries: u32) -> Self {
        Self { remaining: retries, attempts: 0 }
    }

    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Consumes one retry, false once the budget is spent
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
