//! Scenario lifecycle: provision, execute, assert, and always tear down

use chrono::{DateTime, Utc};
use coursecheck_common::{FailureKind, HarnessError, HarnessResult, ScenarioPhase};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error};

use crate::assert::AssertionEngine;
use crate::client::ApiClient;
use crate::execute::Executor;
use crate::provision::Provisioner;
use crate::spec::ScenarioSpec;
use crate::teardown::{FixtureLedger, TeardownManager, TeardownReport};
use crate::template::Bindings;

/// Why a scenario failed and in which phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFailure {
    pub kind: FailureKind,
    pub phase: ScenarioPhase,
    pub message: String,
}

/// Outcome of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    name: String,
    passed: bool,
    failure: Option<ScenarioFailure>,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    fixtures_created: usize,
    teardown: TeardownReport,
    phases: Vec<ScenarioPhase>,
}

impl ScenarioResult {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// First failure, if any
    pub fn failure(&self) -> Option<&ScenarioFailure> {
        self.failure.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn fixtures_created(&self) -> usize {
        self.fixtures_created
    }

    pub fn teardown(&self) -> &TeardownReport {
        &self.teardown
    }

    /// Every phase the scenario entered, in order
    pub fn phases(&self) -> &[ScenarioPhase] {
        &self.phases
    }
}

type PhaseObserver<'a> = Box<dyn Fn(&ScenarioSpec, ScenarioPhase) + Send + Sync + 'a>;

/// A single scenario run, driven through its phases
pub struct Scenario<'a> {
    spec: &'a ScenarioSpec,
    phase: ScenarioPhase,
    trail: Vec<ScenarioPhase>,
    observer: Option<PhaseObserver<'a>>,
}

impl<'a> Scenario<'a> {
    pub fn new(spec: &'a ScenarioSpec) -> Self {
        Self {
            spec,
            phase: ScenarioPhase::Init,
            trail: vec![ScenarioPhase::Init],
            observer: None,
        }
    }

    /// Call `observer` on entering Provisioning, Executing and Asserting.
    /// It runs inside the scenario body, so a panic there fails the
    /// scenario and teardown still follows.
    pub fn on_phase(mut self, observer: impl Fn(&ScenarioSpec, ScenarioPhase) + Send + Sync + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn phase(&self) -> ScenarioPhase {
        self.phase
    }

    fn enter(&mut self, next: ScenarioPhase) -> HarnessResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        debug!("[{}] {} -> {}", self.spec.name, self.phase, next);
        self.phase = next;
        self.trail.push(next);
        let in_body = matches!(
            next,
            ScenarioPhase::Provisioning | ScenarioPhase::Executing | ScenarioPhase::Asserting
        );
        if in_body {
            if let Some(observer) = &self.observer {
                observer(self.spec, next);
            }
        }
        Ok(())
    }

    /// Run to completion. Teardown runs on every exit path of the body,
    /// including errors and panics.
    pub async fn run(mut self, client: &ApiClient) -> ScenarioResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut ledger = FixtureLedger::new();
        let mut bindings = Bindings::fresh();

        let outcome = AssertUnwindSafe(self.body(client, &mut ledger, &mut bindings))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(ScenarioFailure {
                kind: FailureKind::classify(&e),
                phase: self.phase,
                message: e.to_string(),
            }),
            Err(panic) => Some(ScenarioFailure {
                kind: FailureKind::Panic,
                phase: self.phase,
                message: panic_message(panic.as_ref()),
            }),
        };

        let fixtures_created = ledger.len();
        if let Err(e) = self.enter(ScenarioPhase::Teardown) {
            error!("[{}] {}", self.spec.name, e);
        }
        let teardown = TeardownManager::new(client).teardown(&mut ledger).await;
        if let Err(e) = self.enter(ScenarioPhase::Done) {
            error!("[{}] {}", self.spec.name, e);
        }

        ScenarioResult {
            name: self.spec.name.clone(),
            passed: failure.is_none(),
            failure,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            fixtures_created,
            teardown,
            phases: self.trail,
        }
    }

    async fn body(
        &mut self,
        client: &ApiClient,
        ledger: &mut FixtureLedger,
        bindings: &mut Bindings,
    ) -> HarnessResult<()> {
        let spec = self.spec;

        self.enter(ScenarioPhase::Provisioning)?;
        Provisioner::new(client)
            .provision(&spec.fixtures, ledger, bindings)
            .await?;

        self.enter(ScenarioPhase::Executing)?;
        let responses = Executor::new(client).execute(&spec.requests, bindings).await?;

        self.enter(ScenarioPhase::Asserting)?;
        let engine = AssertionEngine::new(ledger.fixtures(), bindings);
        for (request, response) in spec.requests.iter().zip(&responses) {
            engine.check_all(response, &request.expect)?;
        }
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
