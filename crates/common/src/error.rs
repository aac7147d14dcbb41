//! Error types for coursecheck

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using the harness error
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// A single violated expectation, with enough context to diagnose it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    /// Name of the check that failed (`status`, `range`, ...)
    pub check: String,
    /// JSON pointer (or pseudo-field such as `status`) that was inspected
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl AssertionFailure {
    pub fn new(
        check: impl Into<String>,
        field: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Self {
            check: check.into(),
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: expected {}, got {}",
            self.check, self.field, self.expected, self.actual
        )
    }
}

impl std::error::Error for AssertionFailure {}

/// Harness error types
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Provisioning failed for '{alias}': {reason}")]
    Provisioning { alias: String, reason: String },

    #[error("Request timed out after {timeout:?}: {method} {url}")]
    Timeout {
        method: String,
        url: String,
        timeout: Duration,
    },

    #[error("Assertion failed: {0}")]
    Assertion(#[from] AssertionFailure),

    /// Only ever logged; teardown never returns it.
    #[error("Cleanup failed for {kind} {id}: {reason}")]
    Cleanup {
        kind: String,
        id: String,
        reason: String,
    },

    #[error("Transport error on {method} {url}: {reason}")]
    Transport {
        method: String,
        url: String,
        reason: String,
    },

    #[error("Scenario spec error: {0}")]
    SpecParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Walkthrough error: {0}")]
    Walkthrough(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl HarnessError {
    pub fn provisioning(alias: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Provisioning {
            alias: alias.into(),
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
