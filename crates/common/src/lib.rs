//! Coursecheck Common Library
//!
//! Fixture model, expected-value computation, configuration and the error
//! taxonomy shared by the harness and its CLI.

pub mod config;
pub mod error;
pub mod expected;
pub mod types;

// Re-export commonly used types
pub use config::{BrowserConfig, HarnessConfig};
pub use error::{AssertionFailure, HarnessError, HarnessResult};
pub use expected::{within_tolerance, Aggregate, ExpectedValue, DEFAULT_TOLERANCE};
pub use types::*;

/// Coursecheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
