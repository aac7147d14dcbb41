//! Runner that executes scenarios one after another and collects results

use coursecheck_common::{HarnessConfig, HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

use crate::client::ApiClient;
use crate::scenario::{Scenario, ScenarioResult};
use crate::spec::ScenarioSpec;

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Sequential scenario runner against one system under test
pub struct ScenarioRunner {
    client: ApiClient,
    output_dir: PathBuf,
}

impl ScenarioRunner {
    pub fn new(config: &HarnessConfig) -> HarnessResult<Self> {
        Ok(Self {
            client: ApiClient::new(config)?,
            output_dir: config.output_dir.clone(),
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Run a single scenario
    pub async fn run_spec(&self, spec: &ScenarioSpec) -> ScenarioResult {
        info!("Running scenario: {}", spec.name);
        Scenario::new(spec).run(&self.client).await
    }

    /// Run scenarios strictly one after another
    pub async fn run_specs(&self, specs: &[ScenarioSpec]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::with_capacity(specs.len());
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} scenario(s) against {}", specs.len(), self.client.base_url());

        for spec in specs {
            let result = self.run_spec(spec).await;
            if result.passed() {
                passed += 1;
                info!("✓ {} ({} ms)", result.name(), result.duration_ms());
            } else {
                failed += 1;
                let reason = result
                    .failure()
                    .map(|f| format!("[{}] {}", f.phase, f.message))
                    .unwrap_or_else(|| "unknown error".to_string());
                error!("✗ {} - {}", result.name(), reason);
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        SuiteResult {
            total: specs.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Write suite results to `scenario-results.json` in the output directory
    pub fn write_results(&self, results: &SuiteResult) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("scenario-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Narrow a scenario list by exact name or by tag
pub fn select(
    specs: Vec<ScenarioSpec>,
    name: Option<&str>,
    tag: Option<&str>,
) -> HarnessResult<Vec<ScenarioSpec>> {
    if let Some(name) = name {
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| HarnessError::SpecParse(format!("Scenario not found: {}", name)))?;
        return Ok(vec![spec]);
    }
    Ok(match tag {
        Some(tag) => specs.into_iter().filter(|s| s.has_tag(tag)).collect(),
        None => specs,
    })
}
