//! Fixture provisioning in dependency order

use coursecheck_common::{
    Fixture, FixtureId, FixtureKind, HarnessError, HarnessResult, IdRequirement,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::client::ApiClient;
use crate::teardown::FixtureLedger;
use crate::template::{self, Bindings, RUN_TOKEN};

/// One entity to create before the scenario runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSpec {
    /// Name other fixtures and requests use to reference this one
    pub alias: String,

    pub kind: FixtureKind,

    /// Creation payload; may contain `${alias}` and `${run}` placeholders
    #[serde(default)]
    pub payload: Value,

    /// Override of the creation path (defaults to `/<collection>`)
    #[serde(default)]
    pub path: Option<String>,

    /// Override of the expected creation status
    #[serde(default)]
    pub expect_status: Option<u16>,
}

impl FixtureSpec {
    pub fn new(alias: impl Into<String>, kind: FixtureKind, payload: Value) -> Self {
        Self {
            alias: alias.into(),
            kind,
            payload,
            path: None,
            expect_status: None,
        }
    }

    pub(crate) fn references(&self) -> BTreeSet<String> {
        let mut refs = template::references(&self.payload);
        if let Some(path) = &self.path {
            refs.extend(template::references_in(path));
        }
        refs
    }
}

/// Creation order for a plan: a stable topological sort where each spec
/// comes after every alias it references. Specs with no ordering constraint
/// between them keep their declaration order.
pub fn creation_order(specs: &[FixtureSpec]) -> HarnessResult<Vec<usize>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
        if spec.alias.is_empty() || spec.alias == RUN_TOKEN {
            return Err(HarnessError::provisioning(
                &spec.alias,
                "alias must be non-empty and not the reserved 'run'",
            ));
        }
        if index.insert(spec.alias.as_str(), i).is_some() {
            return Err(HarnessError::provisioning(&spec.alias, "duplicate alias"));
        }
    }

    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut own = Vec::new();
        for name in spec.references() {
            let dep = *index.get(name.as_str()).ok_or_else(|| {
                HarnessError::provisioning(
                    &spec.alias,
                    format!("references unknown fixture '{}'", name),
                )
            })?;
            own.push(dep);
        }
        deps.push(own);
    }

    let mut done = vec![false; specs.len()];
    let mut order = Vec::with_capacity(specs.len());
    while order.len() < specs.len() {
        let next = (0..specs.len())
            .find(|&i| !done[i] && deps[i].iter().all(|&d| done[d]))
            .ok_or_else(|| {
                let stuck: Vec<&str> = (0..specs.len())
                    .filter(|&i| !done[i])
                    .map(|i| specs[i].alias.as_str())
                    .collect();
                HarnessError::provisioning(
                    stuck.join(", "),
                    "circular references between fixtures",
                )
            })?;
        done[next] = true;
        order.push(next);
    }
    Ok(order)
}

pub struct Provisioner<'a> {
    client: &'a ApiClient,
}

impl<'a> Provisioner<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Create every fixture of the plan. Each created fixture is recorded in
    /// the ledger before the next call, so a failure part-way leaves the
    /// ledger holding exactly what exists on the system under test.
    pub async fn provision(
        &self,
        specs: &[FixtureSpec],
        ledger: &mut FixtureLedger,
        bindings: &mut Bindings,
    ) -> HarnessResult<()> {
        let order = creation_order(specs)?;
        for i in order {
            self.create(&specs[i], ledger, bindings).await?;
        }
        if !specs.is_empty() {
            info!("Provisioned {} fixture(s)", specs.len());
        }
        Ok(())
    }

    async fn create(
        &self,
        spec: &FixtureSpec,
        ledger: &mut FixtureLedger,
        bindings: &mut Bindings,
    ) -> HarnessResult<()> {
        let alias = spec.alias.as_str();
        let payload = match &spec.payload {
            Value::Null => Value::Object(Default::default()),
            other => bindings
                .resolve_value(other)
                .map_err(|e| HarnessError::provisioning(alias, e))?,
        };
        let path = match &spec.path {
            Some(path) => bindings
                .resolve_str(path)
                .map_err(|e| HarnessError::provisioning(alias, e))?,
            None => format!("/{}", spec.kind.collection()),
        };
        let expected = spec.expect_status.unwrap_or_else(|| spec.kind.create_status());

        let response = self.client.post(&path, &payload).await.map_err(|e| match e {
            HarnessError::Transport { .. } => HarnessError::provisioning(alias, e.to_string()),
            other => other,
        })?;

        if response.status != expected {
            return Err(HarnessError::provisioning(
                alias,
                format!(
                    "POST {} returned {} (expected {}): {}",
                    path, response.status, expected, response.body
                ),
            ));
        }

        let id = match spec.kind.id_requirement() {
            IdRequirement::Absent => None,
            requirement => {
                let id = response.body.get("id").and_then(FixtureId::from_json);
                if id.is_none() && requirement == IdRequirement::Required {
                    return Err(HarnessError::provisioning(
                        alias,
                        format!("{} create response has no id: {}", spec.kind, response.body),
                    ));
                }
                id
            }
        };

        debug!("Created {} '{}' via POST {}", spec.kind, alias, path);
        if let Some(id) = &id {
            bindings.bind(alias, id.clone());
        }
        ledger.record(Fixture::new(spec.kind, alias, id, payload));
        Ok(())
    }
}
