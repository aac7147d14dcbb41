//! Coursecheck E2E Harness
//!
//! Fixture-scoped end-to-end scenarios against the course platform's HTTP
//! API, plus Playwright-driven browser walkthroughs:
//! - Provisions fixtures from a declarative plan, in dependency order
//! - Issues the calls under test with a fixed timeout and no retries
//! - Asserts status, shape and aggregates computed from the fixtures
//! - Tears down every fixture on every exit path, best-effort
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ScenarioRunner (sequential)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario: Init → Provisioning → Executing → Asserting      │
//! │            └──────────── any failure ──────────┐            │
//! │                                    Teardown → Done          │
//! │    ├── Provisioner    POST /<collection>  → FixtureLedger   │
//! │    ├── Executor       RequestSpec         → ApiResponse     │
//! │    ├── AssertionEngine Check × response   → AssertionFailure│
//! │    └── TeardownManager DELETE /<coll>/<id> (errors ignored) │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioSpec (YAML or catalog)                             │
//! │    ├── fixtures: [FixtureSpec { alias, kind, payload }]     │
//! │    └── requests: [RequestSpec { method, path, expect }]     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assert;
pub mod catalog;
pub mod client;
pub mod execute;
pub mod playwright;
pub mod provision;
pub mod runner;
pub mod scenario;
pub mod spec;
pub mod teardown;
pub mod template;
pub mod walkthrough;

pub use assert::{AssertionEngine, Check, EqualsValue};
pub use client::{ApiClient, ApiResponse, HttpMethod};
pub use execute::{Executor, RequestSpec};
pub use provision::{FixtureSpec, Provisioner};
pub use runner::{ScenarioRunner, SuiteResult};
pub use scenario::{Scenario, ScenarioFailure, ScenarioResult};
pub use spec::ScenarioSpec;
pub use teardown::{FixtureLedger, TeardownManager, TeardownReport};
pub use template::Bindings;
pub use walkthrough::{WalkStep, WalkthroughSpec};
