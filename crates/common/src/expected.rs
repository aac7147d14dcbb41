//! Expected values computed locally from fixture inputs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{Fixture, FixtureKind};

/// Pass threshold for floating-point aggregates
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// `|actual - expected| < tolerance`
pub fn within_tolerance(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() < tolerance
}

/// A value the system under test should report, either given literally or
/// derived from the fixtures the scenario created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedValue {
    Literal(f64),
    Computed(Aggregate),
}

/// Aggregation over the payloads of fixtures of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Count {
        kind: FixtureKind,
        #[serde(default, rename = "where")]
        filter: BTreeMap<String, Value>,
    },
    Sum {
        kind: FixtureKind,
        field: String,
        #[serde(default, rename = "where")]
        filter: BTreeMap<String, Value>,
    },
    Mean {
        kind: FixtureKind,
        field: String,
        #[serde(default, rename = "where")]
        filter: BTreeMap<String, Value>,
    },
}

impl ExpectedValue {
    /// Evaluate against the scenario's fixtures. `None` means the value is
    /// undefined (mean over no fixtures) and the system should report null.
    pub fn evaluate(&self, fixtures: &[Fixture]) -> Option<f64> {
        match self {
            ExpectedValue::Literal(v) => Some(*v),
            ExpectedValue::Computed(agg) => agg.evaluate(fixtures),
        }
    }
}

impl Aggregate {
    pub fn evaluate(&self, fixtures: &[Fixture]) -> Option<f64> {
        match self {
            Aggregate::Count { kind, filter } => {
                Some(selected(fixtures, *kind, filter).count() as f64)
            }
            Aggregate::Sum { kind, field, filter } => Some(
                selected(fixtures, *kind, filter)
                    .filter_map(|f| number_field(&f.payload, field))
                    .sum(),
            ),
            Aggregate::Mean { kind, field, filter } => {
                let values: Vec<f64> = selected(fixtures, *kind, filter)
                    .filter_map(|f| number_field(&f.payload, field))
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
        }
    }
}

fn selected<'a>(
    fixtures: &'a [Fixture],
    kind: FixtureKind,
    filter: &'a BTreeMap<String, Value>,
) -> impl Iterator<Item = &'a Fixture> + 'a {
    fixtures.iter().filter(move |f| {
        f.kind == kind
            && filter
                .iter()
                .all(|(key, want)| f.payload.get(key) == Some(want))
    })
}

fn number_field(payload: &Value, field: &str) -> Option<f64> {
    payload.get(field).and_then(Value::as_f64)
}

impl fmt::Display for ExpectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedValue::Literal(v) => write!(f, "{}", v),
            ExpectedValue::Computed(Aggregate::Count { kind, .. }) => write!(f, "count({})", kind),
            ExpectedValue::Computed(Aggregate::Sum { kind, field, .. }) => {
                write!(f, "sum({}.{})", kind, field)
            }
            ExpectedValue::Computed(Aggregate::Mean { kind, field, .. }) => {
                write!(f, "mean({}.{})", kind, field)
            }
        }
    }
}
