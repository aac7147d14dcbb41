//! Fixture ledger and best-effort teardown
//!
//! Every fixture created during a scenario is recorded in its
//! [`FixtureLedger`]. [`TeardownManager::teardown`] drains the ledger and
//! issues one deletion per identified fixture, newest first, so dependents
//! (enrollments, payments) go before what they reference (courses, users).
//! Deletion failures are logged and counted, never returned.

use coursecheck_common::{Fixture, HarnessError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::client::ApiClient;

/// Fixtures owned by one scenario, in creation order
#[derive(Debug, Default)]
pub struct FixtureLedger {
    fixtures: Vec<Fixture>,
}

impl FixtureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, fixture: Fixture) {
        debug!(
            "Recorded {} '{}' ({})",
            fixture.kind,
            fixture.alias,
            fixture
                .id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "no id".to_string())
        );
        self.fixtures.push(fixture);
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Take every fixture out, newest first
    fn drain_newest_first(&mut self) -> Vec<Fixture> {
        let mut drained = std::mem::take(&mut self.fixtures);
        drained.reverse();
        drained
    }
}

impl Drop for FixtureLedger {
    fn drop(&mut self) {
        let leaked: Vec<String> = self
            .fixtures
            .iter()
            .filter_map(|f| f.delete_path())
            .collect();
        if !leaked.is_empty() {
            error!("Fixture ledger dropped without teardown: {}", leaked.join(", "));
        }
    }
}

/// Outcome of one teardown pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    /// Deletion calls issued
    pub attempted: usize,
    /// Deletions that errored or answered non-2xx
    pub failed: usize,
    /// Fixtures without an identifier, which cannot be deleted
    pub skipped: usize,
}

pub struct TeardownManager<'a> {
    client: &'a ApiClient,
}

impl<'a> TeardownManager<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Delete every recorded fixture exactly once. Running it again on the
    /// same ledger is a no-op.
    pub async fn teardown(&self, ledger: &mut FixtureLedger) -> TeardownReport {
        let mut report = TeardownReport::default();

        for fixture in ledger.drain_newest_first() {
            if fixture.delete_path().is_none() {
                debug!("Skipping {} '{}': no identifier", fixture.kind, fixture.alias);
                report.skipped += 1;
                continue;
            }
            report.attempted += 1;
            if !self.delete_fixture(&fixture).await {
                report.failed += 1;
            }
        }

        if report.attempted > 0 {
            debug!(
                "Teardown: {} deleted, {} failed, {} skipped",
                report.attempted - report.failed,
                report.failed,
                report.skipped
            );
        }
        report
    }

    /// Issue one deletion call. Returns whether it succeeded; errors are
    /// logged and swallowed.
    pub async fn delete_fixture(&self, fixture: &Fixture) -> bool {
        let Some(path) = fixture.delete_path() else {
            return false;
        };
        let id = fixture
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();

        let reason = match self.client.delete(&path).await {
            Ok(response) if response.is_success() => {
                debug!("Deleted {} '{}' ({})", fixture.kind, fixture.alias, path);
                return true;
            }
            Ok(response) => format!("DELETE {} returned {}", path, response.status),
            Err(e) => e.to_string(),
        };

        let cleanup = HarnessError::Cleanup {
            kind: fixture.kind.to_string(),
            id,
            reason,
        };
        warn!("{}", cleanup);
        false
    }
}
