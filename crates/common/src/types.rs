//! Core types for coursecheck

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::HarnessError;

/// Kind of entity a scenario can provision on the system under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    Instructor,
    User,
    Student,
    Course,
    Enrollment,
    Progress,
    Rating,
    Payment,
}

/// Whether the system under test hands back an identifier on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRequirement {
    Required,
    Optional,
    Absent,
}

impl FixtureKind {
    /// Collection segment used for both creation and deletion
    pub fn collection(&self) -> &'static str {
        match self {
            FixtureKind::Instructor | FixtureKind::User => "users",
            FixtureKind::Student => "students",
            FixtureKind::Course => "courses",
            FixtureKind::Enrollment => "enrollments",
            FixtureKind::Progress => "progress",
            FixtureKind::Rating => "ratings",
            FixtureKind::Payment => "payments",
        }
    }

    /// Status the creation call must answer with
    pub fn create_status(&self) -> u16 {
        match self {
            FixtureKind::Progress => 200,
            _ => 201,
        }
    }

    pub fn id_requirement(&self) -> IdRequirement {
        match self {
            FixtureKind::Instructor
            | FixtureKind::User
            | FixtureKind::Student
            | FixtureKind::Course
            | FixtureKind::Enrollment => IdRequirement::Required,
            FixtureKind::Rating | FixtureKind::Payment => IdRequirement::Optional,
            FixtureKind::Progress => IdRequirement::Absent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FixtureKind::Instructor => "instructor",
            FixtureKind::User => "user",
            FixtureKind::Student => "student",
            FixtureKind::Course => "course",
            FixtureKind::Enrollment => "enrollment",
            FixtureKind::Progress => "progress",
            FixtureKind::Rating => "rating",
            FixtureKind::Payment => "payment",
        }
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier assigned by the system under test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureId {
    Int(i64),
    Str(String),
}

impl FixtureId {
    /// Extract an identifier from a JSON value; blank strings and other
    /// types are not identifiers.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(FixtureId::Int),
            Value::String(s) if !s.trim().is_empty() => Some(FixtureId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FixtureId::Int(n) => Value::from(*n),
            FixtureId::Str(s) => Value::String(s.clone()),
        }
    }

    /// Whether a JSON value denotes this identifier (`7` and `"7"` both match `Int(7)`)
    pub fn matches_json(&self, value: &Value) -> bool {
        match (self, value) {
            (FixtureId::Int(n), Value::Number(v)) => v.as_i64() == Some(*n),
            (FixtureId::Int(n), Value::String(s)) => s == &n.to_string(),
            (FixtureId::Str(s), Value::String(v)) => s == v,
            (FixtureId::Str(s), Value::Number(v)) => s == &v.to_string(),
            _ => false,
        }
    }
}

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureId::Int(n) => write!(f, "{}", n),
            FixtureId::Str(s) => f.write_str(s),
        }
    }
}

/// An entity created purely to support one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub kind: FixtureKind,
    pub alias: String,
    pub id: Option<FixtureId>,
    /// Creation payload after reference resolution
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Fixture {
    pub fn new(kind: FixtureKind, alias: impl Into<String>, id: Option<FixtureId>, payload: Value) -> Self {
        Self {
            kind,
            alias: alias.into(),
            id,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Path of the deletion call, if this fixture can be deleted at all
    pub fn delete_path(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(|id| format!("/{}/{}", self.kind.collection(), id))
    }
}

/// Lifecycle of a single scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    Init,
    Provisioning,
    Executing,
    Asserting,
    Teardown,
    Done,
}

impl ScenarioPhase {
    pub fn can_transition_to(&self, next: ScenarioPhase) -> bool {
        use ScenarioPhase::*;
        match (self, next) {
            (Done, _) => false,
            (Teardown, Done) => true,
            (Teardown, _) => false,
            (_, Teardown) => true,
            (Init, Provisioning) | (Provisioning, Executing) | (Executing, Asserting) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioPhase::Done)
    }
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioPhase::Init => "init",
            ScenarioPhase::Provisioning => "provisioning",
            ScenarioPhase::Executing => "executing",
            ScenarioPhase::Asserting => "asserting",
            ScenarioPhase::Teardown => "teardown",
            ScenarioPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Classification of why a scenario failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Provisioning,
    Timeout,
    Transport,
    Assertion,
    Spec,
    Panic,
    Harness,
}

impl FailureKind {
    pub fn classify(err: &HarnessError) -> Self {
        match err {
            HarnessError::Provisioning { .. } => FailureKind::Provisioning,
            HarnessError::Timeout { .. } => FailureKind::Timeout,
            HarnessError::Transport { .. } => FailureKind::Transport,
            HarnessError::Assertion(_) => FailureKind::Assertion,
            HarnessError::SpecParse(_) => FailureKind::Spec,
            _ => FailureKind::Harness,
        }
    }
}
