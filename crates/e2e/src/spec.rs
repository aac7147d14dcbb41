//! Declarative YAML scenario files

use coursecheck_common::{HarnessError, HarnessResult, IdRequirement};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::assert::Check;
use crate::execute::RequestSpec;
use crate::provision::{creation_order, FixtureSpec};
use crate::template::{references, references_in};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Fixtures to provision before the calls under test
    #[serde(default)]
    pub fixtures: Vec<FixtureSpec>,

    /// Calls under test, issued in order
    pub requests: Vec<RequestSpec>,
}

impl ScenarioSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| HarnessError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios below a directory, sorted by name
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specs)
    }

    /// Structural checks that do not need the system under test
    pub fn validate(&self) -> HarnessResult<()> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::SpecParse("scenario name is empty".to_string()));
        }
        if self.requests.is_empty() {
            return Err(HarnessError::SpecParse(format!(
                "scenario '{}' has no requests",
                self.name
            )));
        }
        creation_order(&self.fixtures)
            .map_err(|e| HarnessError::SpecParse(format!("scenario '{}': {}", self.name, e)))?;

        let kinds: HashMap<&str, _> = self
            .fixtures
            .iter()
            .map(|f| (f.alias.as_str(), f.kind))
            .collect();
        let identified = |alias: &str, used_by: &str| -> HarnessResult<()> {
            match kinds.get(alias) {
                None => Err(HarnessError::SpecParse(format!(
                    "scenario '{}': {} references unknown fixture '{}'",
                    self.name, used_by, alias
                ))),
                Some(kind) if kind.id_requirement() == IdRequirement::Absent => {
                    Err(HarnessError::SpecParse(format!(
                        "scenario '{}': {} references '{}', but {} fixtures have no id",
                        self.name, used_by, alias, kind
                    )))
                }
                Some(_) => Ok(()),
            }
        };

        for fixture in &self.fixtures {
            for alias in fixture.references() {
                identified(&alias, &format!("fixture '{}'", fixture.alias))?;
            }
        }
        for request in &self.requests {
            let used_by = format!("request {}", request.path);
            for alias in request_references(request) {
                identified(&alias, &used_by)?;
            }
        }
        Ok(())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Aliases a request needs ids for: its path, its body and id-matching checks
fn request_references(request: &RequestSpec) -> BTreeSet<String> {
    let mut aliases = references_in(&request.path);
    if let Some(body) = &request.body {
        aliases.extend(references(body));
    }
    for check in &request.expect {
        if let Check::ContainsIds { aliases: ids, .. } | Check::IdsWithin { aliases: ids, .. } = check {
            aliases.extend(ids.iter().cloned());
        }
    }
    aliases
}
