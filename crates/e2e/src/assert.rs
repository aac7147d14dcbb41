//! Assertion engine for API responses
//!
//! Checks are evaluated in declaration order; the first violation is
//! returned as an [`AssertionFailure`] naming the field, the expected value
//! and what was actually observed. Targets are JSON pointers (`""` is the
//! whole body). When a target is an array, per-element checks apply to
//! every element.

use coursecheck_common::{
    within_tolerance, AssertionFailure, ExpectedValue, Fixture, FixtureId, DEFAULT_TOLERANCE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ApiResponse;
use crate::template::Bindings;

/// A single expectation about a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    /// HTTP status equals `expected`
    Status { expected: u16 },

    /// Every named field is present and non-empty; a field starting with
    /// `/` is a pointer into the element (`/student_profile/email`)
    Required {
        #[serde(default)]
        at: String,
        fields: Vec<String>,
    },

    /// Numeric field within `[min, max]`; with `optional`, absent or null passes
    Range {
        #[serde(default)]
        at: String,
        field: String,
        min: f64,
        max: f64,
        #[serde(default)]
        optional: bool,
    },

    /// Value at `field` equals a literal or a value computed from the
    /// fixtures (numbers within tolerance)
    Equals { field: String, value: EqualsValue },

    /// Number at the first present pointer of `fields` matches a computed value
    Aggregate {
        fields: Vec<String>,
        expected: ExpectedValue,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },

    /// Array at `at` has the expected number of elements
    Length {
        #[serde(default)]
        at: String,
        expected: ExpectedValue,
    },

    /// Array at `at` holds an element for each listed fixture
    ContainsIds {
        #[serde(default)]
        at: String,
        #[serde(default = "default_id_field")]
        id_field: String,
        aliases: Vec<String>,
    },

    /// Value at `at` is an array
    IsArray {
        #[serde(default)]
        at: String,
    },

    /// Field is a number; with `optional`, absent or null passes
    IsNumber {
        #[serde(default)]
        at: String,
        field: String,
        #[serde(default)]
        optional: bool,
    },

    /// Array at `at` has at most `max` elements
    MaxLength {
        #[serde(default)]
        at: String,
        max: usize,
    },

    /// Every element of the array at `at` carries, at pointer `id_field`,
    /// the id of one of the listed fixtures
    IdsWithin {
        #[serde(default)]
        at: String,
        #[serde(default = "default_id_pointer")]
        id_field: String,
        aliases: Vec<String>,
    },
}

/// Right-hand side of an `equals` check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EqualsValue {
    /// A number or an aggregate over the fixtures
    Expected(ExpectedValue),
    /// Any other JSON value, compared exactly
    Json(Value),
}

impl From<Value> for EqualsValue {
    fn from(value: Value) -> Self {
        match value.as_f64() {
            Some(n) => EqualsValue::Expected(ExpectedValue::Literal(n)),
            None => EqualsValue::Json(value),
        }
    }
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_id_pointer() -> String {
    "/id".to_string()
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::Status { .. } => "status",
            Check::Required { .. } => "required",
            Check::Range { .. } => "range",
            Check::Equals { .. } => "equals",
            Check::Aggregate { .. } => "aggregate",
            Check::Length { .. } => "length",
            Check::ContainsIds { .. } => "contains_ids",
            Check::IsArray { .. } => "is_array",
            Check::IsNumber { .. } => "is_number",
            Check::MaxLength { .. } => "max_length",
            Check::IdsWithin { .. } => "ids_within",
        }
    }
}

/// Evaluates checks against responses, with the scenario's fixtures as the
/// source of expected values
pub struct AssertionEngine<'a> {
    fixtures: &'a [Fixture],
    bindings: &'a Bindings,
}

impl<'a> AssertionEngine<'a> {
    pub fn new(fixtures: &'a [Fixture], bindings: &'a Bindings) -> Self {
        Self { fixtures, bindings }
    }

    pub fn check_all(&self, response: &ApiResponse, checks: &[Check]) -> Result<(), AssertionFailure> {
        checks.iter().try_for_each(|check| self.check(response, check))
    }

    pub fn check(&self, response: &ApiResponse, check: &Check) -> Result<(), AssertionFailure> {
        let name = check.name();
        let body = &response.body;
        match check {
            Check::Status { expected } => {
                if response.status == *expected {
                    Ok(())
                } else {
                    Err(AssertionFailure::new(name, "status", expected, response.status))
                }
            }

            Check::Required { at, fields } => {
                for (path, element) in elements(name, body, at)? {
                    for field in fields {
                        let value = member(element, field);
                        if !value.map(is_non_empty).unwrap_or(false) {
                            return Err(AssertionFailure::new(
                                name,
                                member_path(&path, field),
                                "non-empty value",
                                describe(value),
                            ));
                        }
                    }
                }
                Ok(())
            }

            Check::Range { at, field, min, max, optional } => {
                for (path, element) in elements(name, body, at)? {
                    let field_path = member_path(&path, field);
                    let expected = format!("number in [{}, {}]", min, max);
                    match member(element, field) {
                        None | Some(Value::Null) if *optional => {}
                        Some(Value::Number(n)) => {
                            let v = n.as_f64().unwrap_or(f64::NAN);
                            if !(v >= *min && v <= *max) {
                                return Err(AssertionFailure::new(name, field_path, expected, v));
                            }
                        }
                        other => {
                            return Err(AssertionFailure::new(name, field_path, expected, describe(other)));
                        }
                    }
                }
                Ok(())
            }

            Check::Equals { field, value } => {
                let actual = body.pointer(field);
                match value {
                    EqualsValue::Expected(expected) => {
                        self.compare(name, field, expected, actual, DEFAULT_TOLERANCE)
                    }
                    EqualsValue::Json(want) if actual == Some(want) => Ok(()),
                    EqualsValue::Json(want) => {
                        Err(AssertionFailure::new(name, field.as_str(), want, describe(actual)))
                    }
                }
            }

            Check::Aggregate { fields, expected, tolerance } => {
                let found = fields
                    .iter()
                    .find_map(|f| body.pointer(f).map(|v| (f.as_str(), v)));
                let field = found
                    .map(|(f, _)| f.to_string())
                    .unwrap_or_else(|| fields.join("|"));
                self.compare(name, &field, expected, found.map(|(_, v)| v), *tolerance)
            }

            Check::Length { at, expected } => {
                let items = array_at(name, body, at)?;
                match expected.evaluate(self.fixtures) {
                    Some(want) if within_tolerance(items.len() as f64, want, DEFAULT_TOLERANCE) => Ok(()),
                    Some(want) => Err(AssertionFailure::new(
                        name,
                        pointer_label(at),
                        format!("{} = {} element(s)", expected, want),
                        items.len(),
                    )),
                    None => Err(AssertionFailure::new(
                        name,
                        pointer_label(at),
                        format!("{} to be defined", expected),
                        items.len(),
                    )),
                }
            }

            Check::ContainsIds { at, id_field, aliases } => {
                let items = array_at(name, body, at)?;
                for alias in aliases {
                    let id = self.bindings.id(alias).ok_or_else(|| {
                        AssertionFailure::new(name, pointer_label(at), format!("fixture '{}' to exist", alias), "unbound alias")
                    })?;
                    let present = items
                        .iter()
                        .any(|item| item.get(id_field).map(|v| id.matches_json(v)).unwrap_or(false));
                    if !present {
                        let seen: Vec<String> = items
                            .iter()
                            .filter_map(|item| item.get(id_field))
                            .map(Value::to_string)
                            .collect();
                        return Err(AssertionFailure::new(
                            name,
                            pointer_label(at),
                            format!("{} {} ('{}')", id_field, id, alias),
                            format!("[{}]", seen.join(", ")),
                        ));
                    }
                }
                Ok(())
            }

            Check::IsArray { at } => array_at(name, body, at).map(|_| ()),

            Check::IsNumber { at, field, optional } => {
                for (path, element) in elements(name, body, at)? {
                    match member(element, field) {
                        Some(Value::Number(_)) => {}
                        None | Some(Value::Null) if *optional => {}
                        other => {
                            return Err(AssertionFailure::new(
                                name,
                                member_path(&path, field),
                                "number",
                                describe(other),
                            ));
                        }
                    }
                }
                Ok(())
            }

            Check::MaxLength { at, max } => {
                let items = array_at(name, body, at)?;
                if items.len() <= *max {
                    Ok(())
                } else {
                    Err(AssertionFailure::new(
                        name,
                        pointer_label(at),
                        format!("at most {} element(s)", max),
                        items.len(),
                    ))
                }
            }

            Check::IdsWithin { at, id_field, aliases } => {
                let items = array_at(name, body, at)?;
                let allowed: Vec<&FixtureId> = aliases
                    .iter()
                    .filter_map(|alias| self.bindings.id(alias))
                    .collect();
                for (i, item) in items.iter().enumerate() {
                    let value = item.pointer(id_field);
                    if !value.map_or(false, |v| allowed.iter().any(|id| id.matches_json(v))) {
                        return Err(AssertionFailure::new(
                            name,
                            format!("{}/{}{}", at, i, id_field),
                            format!("one of {}", aliases.join(", ")),
                            describe(value),
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    /// Number at `field` against an expected value; an undefined expected
    /// value (mean over nothing) requires null or absence
    fn compare(
        &self,
        name: &str,
        field: &str,
        expected: &ExpectedValue,
        actual: Option<&Value>,
        tolerance: f64,
    ) -> Result<(), AssertionFailure> {
        match (expected.evaluate(self.fixtures), actual) {
            (None, None) | (None, Some(Value::Null)) => Ok(()),
            (None, other) => Err(AssertionFailure::new(name, field, "null", describe(other))),
            (Some(want), Some(Value::Number(n))) => {
                let got = n.as_f64().unwrap_or(f64::NAN);
                if within_tolerance(got, want, tolerance) {
                    Ok(())
                } else {
                    Err(AssertionFailure::new(
                        name,
                        field,
                        format!("{} = {} (±{})", expected, want, tolerance),
                        got,
                    ))
                }
            }
            (Some(want), other) => Err(AssertionFailure::new(
                name,
                field,
                format!("{} = {}", expected, want),
                describe(other),
            )),
        }
    }
}

fn pointer_label(at: &str) -> String {
    if at.is_empty() {
        "body".to_string()
    } else {
        at.to_string()
    }
}

fn target<'v>(check: &str, body: &'v Value, at: &str) -> Result<&'v Value, AssertionFailure> {
    body.pointer(at)
        .ok_or_else(|| AssertionFailure::new(check, pointer_label(at), "present", "absent"))
}

fn array_at<'v>(check: &str, body: &'v Value, at: &str) -> Result<&'v Vec<Value>, AssertionFailure> {
    match target(check, body, at)? {
        Value::Array(items) => Ok(items),
        other => Err(AssertionFailure::new(check, pointer_label(at), "array", kind_of(other))),
    }
}

/// The target itself, or each element when it is an array; elements must be objects
fn elements<'v>(check: &str, body: &'v Value, at: &str) -> Result<Vec<(String, &'v Value)>, AssertionFailure> {
    let base = target(check, body, at)?;
    let items: Vec<(String, &Value)> = match base {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("{}/{}", at, i), v))
            .collect(),
        other => vec![(at.to_string(), other)],
    };
    for (path, item) in &items {
        if !item.is_object() {
            return Err(AssertionFailure::new(check, pointer_label(path), "object", kind_of(item)));
        }
    }
    Ok(items)
}

/// Field of an element: a plain key, or a JSON pointer when it starts with `/`
fn member<'v>(element: &'v Value, field: &str) -> Option<&'v Value> {
    if field.starts_with('/') {
        element.pointer(field)
    } else {
        element.get(field)
    }
}

fn member_path(path: &str, field: &str) -> String {
    if field.starts_with('/') {
        format!("{}{}", path, field)
    } else {
        format!("{}/{}", path, field)
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "absent".to_string(),
        Some(v) => v.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecheck_common::{Aggregate, FixtureId, FixtureKind};
    use serde_json::json;
    use std::collections::BTreeMap;
    use test_case::test_case;

    fn ok(body: Value) -> ApiResponse {
        ApiResponse { status: 200, body }
    }

    fn ratings() -> Vec<Fixture> {
        [4.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, r)| {
                Fixture::new(
                    FixtureKind::Rating,
                    format!("rating-{}", i),
                    Some(FixtureId::Int(i as i64)),
                    json!({ "rating": r }),
                )
            })
            .collect()
    }

    fn run(check: Check, response: &ApiResponse) -> Result<(), AssertionFailure> {
        let fixtures = ratings();
        let mut bindings = Bindings::new("t");
        bindings.bind("course", FixtureId::Int(12));
        AssertionEngine::new(&fixtures, &bindings).check(response, &check)
    }

    fn progress_range() -> Check {
        Check::Range {
            at: String::new(),
            field: "progress".into(),
            min: 0.0,
            max: 100.0,
            optional: true,
        }
    }

    #[test_case(json!([{ "progress": 50 }]), true ; "in range")]
    #[test_case(json!([{ "full_name": "x" }]), true ; "absent")]
    #[test_case(json!([{ "progress": null }]), true ; "null")]
    #[test_case(json!([{ "progress": 100.0 }, { "progress": 0 }]), true ; "bounds inclusive")]
    #[test_case(json!([{ "progress": 101 }]), false ; "above range")]
    #[test_case(json!([{ "progress": -1 }]), false ; "below range")]
    #[test_case(json!([{ "progress": "50" }]), false ; "wrong type")]
    fn optional_progress(body: Value, pass: bool) {
        assert_eq!(run(progress_range(), &ok(body)).is_ok(), pass);
    }

    #[test]
    fn required_fields_must_be_non_empty() {
        let check = Check::Required {
            at: String::new(),
            fields: vec!["full_name".into(), "email".into()],
        };
        assert!(run(check.clone(), &ok(json!([{ "full_name": "A", "email": "a@x" }]))).is_ok());

        let failure = run(check, &ok(json!([{ "full_name": "A", "email": "a@x" }, { "full_name": " ", "email": "b@x" }])))
            .unwrap_err();
        assert_eq!(failure.field, "/1/full_name");
        assert_eq!(failure.actual, "\" \"");
    }

    #[test]
    fn required_accepts_nested_pointers() {
        let check = Check::Required {
            at: String::new(),
            fields: vec!["/student_profile/full_name".into(), "/student_profile/email".into()],
        };
        let good = json!([{ "student_profile": { "full_name": "A", "email": "a@x" } }]);
        assert!(run(check.clone(), &ok(good)).is_ok());

        let failure = run(check, &ok(json!([{ "student_profile": { "full_name": "A" } }]))).unwrap_err();
        assert_eq!(failure.field, "/0/student_profile/email");
        assert_eq!(failure.actual, "absent");
    }

    #[test]
    fn aggregate_uses_first_present_alternative() {
        let check = Check::Aggregate {
            fields: vec!["/average_rating".into(), "/average_ratings".into()],
            expected: ExpectedValue::Computed(Aggregate::Mean {
                kind: FixtureKind::Rating,
                field: "rating".into(),
                filter: BTreeMap::new(),
            }),
            tolerance: DEFAULT_TOLERANCE,
        };
        assert!(run(check.clone(), &ok(json!({ "average_ratings": 4.5 }))).is_ok());
        assert!(run(check.clone(), &ok(json!({ "average_rating": 4.505 }))).is_ok());

        let failure = run(check, &ok(json!({ "average_rating": 4.0 }))).unwrap_err();
        assert_eq!(failure.field, "/average_rating");
        assert_eq!(failure.actual, "4");
    }

    #[test]
    fn status_failure_reports_both_codes() {
        let response = ApiResponse { status: 404, body: json!({ "error": "not found" }) };
        let failure = run(Check::Status { expected: 200 }, &response).unwrap_err();
        assert_eq!(failure.to_string(), "status status: expected 200, got 404");
    }

    #[test]
    fn contains_ids_matches_bound_fixture() {
        let check = Check::ContainsIds {
            at: String::new(),
            id_field: "id".into(),
            aliases: vec!["course".into()],
        };
        assert!(run(check.clone(), &ok(json!([{ "id": 3 }, { "id": 12 }]))).is_ok());
        assert!(run(check, &ok(json!([{ "id": 3 }]))).is_err());
    }

    #[test]
    fn length_and_equals() {
        let length = Check::Length {
            at: String::new(),
            expected: ExpectedValue::Computed(Aggregate::Count {
                kind: FixtureKind::Rating,
                filter: BTreeMap::new(),
            }),
        };
        assert!(run(length.clone(), &ok(json!([{}, {}]))).is_ok());
        assert!(run(length, &ok(json!({}))).is_err());

        let equals = Check::Equals { field: "/total_students".into(), value: json!(2).into() };
        assert!(run(equals.clone(), &ok(json!({ "total_students": 2 }))).is_ok());
        assert!(run(equals, &ok(json!({ "total_students": 3 }))).is_err());
    }

    #[test]
    fn equals_evaluates_computed_values_against_fixtures() {
        let fixtures: Vec<Fixture> = [(100.0, "succeeded"), (150.0, "succeeded"), (75.0, "failed")]
            .iter()
            .enumerate()
            .map(|(i, (amount, status))| {
                Fixture::new(
                    FixtureKind::Payment,
                    format!("payment-{}", i),
                    None,
                    json!({ "amount": amount, "status": status }),
                )
            })
            .collect();
        let bindings = Bindings::new("t");
        let engine = AssertionEngine::new(&fixtures, &bindings);
        let check: Check = serde_yaml::from_str(
            "{ check: equals, field: /total_revenue, value: { sum: { kind: payment, field: amount, where: { status: succeeded } } } }",
        )
        .unwrap();
        assert!(matches!(&check, Check::Equals { value: EqualsValue::Expected(ExpectedValue::Computed(_)), .. }));

        assert!(engine.check(&ok(json!({ "total_revenue": 250.0 })), &check).is_ok());
        assert!(engine.check(&ok(json!({ "total_revenue": 250.004 })), &check).is_ok());

        let failure = engine.check(&ok(json!({ "total_revenue": 325.0 })), &check).unwrap_err();
        assert_eq!(failure.field, "/total_revenue");
        assert!(failure.expected.contains("sum(payment.amount)"), "{}", failure.expected);
        assert_eq!(failure.actual, "325");

        let literal_object = Check::Equals {
            field: "/summary".into(),
            value: json!({ "sum": "not an aggregate" }).into(),
        };
        assert!(engine.check(&ok(json!({ "summary": { "sum": "not an aggregate" } })), &literal_object).is_ok());
    }

    #[test]
    fn equals_computed_mean_over_nothing_requires_null() {
        let bindings = Bindings::new("t");
        let engine = AssertionEngine::new(&[], &bindings);
        let check = Check::Equals {
            field: "/average_rating".into(),
            value: EqualsValue::Expected(ExpectedValue::Computed(Aggregate::Mean {
                kind: FixtureKind::Rating,
                field: "rating".into(),
                filter: BTreeMap::new(),
            })),
        };
        assert!(engine.check(&ok(json!({ "average_rating": null })), &check).is_ok());
        assert!(engine.check(&ok(json!({ "average_rating": 0 })), &check).is_err());
    }

    #[test_case(json!([{ "earnings": 10.5 }, { "earnings": 0 }]), false, true ; "numbers")]
    #[test_case(json!([{ "earnings": null }]), true, true ; "optional null")]
    #[test_case(json!([{ "course_id": 1 }]), true, true ; "optional absent")]
    #[test_case(json!([{ "earnings": null }]), false, false ; "required null")]
    #[test_case(json!([{ "earnings": "10" }]), true, false ; "string")]
    fn is_number(body: Value, optional: bool, pass: bool) {
        let check = Check::IsNumber { at: String::new(), field: "earnings".into(), optional };
        assert_eq!(run(check, &ok(body)).is_ok(), pass);
    }

    #[test]
    fn max_length_caps_array_size() {
        let check = Check::MaxLength { at: "/items".into(), max: 2 };
        assert!(run(check.clone(), &ok(json!({ "items": [] }))).is_ok());
        assert!(run(check.clone(), &ok(json!({ "items": [1, 2] }))).is_ok());

        let failure = run(check, &ok(json!({ "items": [1, 2, 3] }))).unwrap_err();
        assert_eq!(failure.field, "/items");
        assert_eq!(failure.actual, "3");
    }

    #[test]
    fn ids_within_checks_nested_pointer() {
        let check = Check::IdsWithin {
            at: String::new(),
            id_field: "/course/id".into(),
            aliases: vec!["course".into()],
        };
        assert!(run(check.clone(), &ok(json!([]))).is_ok());
        assert!(run(check.clone(), &ok(json!([{ "course": { "id": 12 } }, { "course": { "id": "12" } }]))).is_ok());

        let failure = run(check.clone(), &ok(json!([{ "course": { "id": 12 } }, { "course": { "id": 4 } }])))
            .unwrap_err();
        assert_eq!(failure.field, "/1/course/id");
        assert!(run(check, &ok(json!([{ "course": {} }]))).is_err());
    }

    #[test]
    fn checks_parse_from_yaml() {
        let checks: Vec<Check> = serde_yaml::from_str(
            r#"
- { check: status, expected: 200 }
- { check: range, field: progress, min: 0, max: 100, optional: true }
- check: aggregate
  fields: [/total_revenue]
  expected: { sum: { kind: payment, field: amount, where: { status: succeeded } } }
- { check: is_number, at: /courses, field: earnings, optional: true }
- { check: max_length, max: 10 }
- { check: ids_within, id_field: /course/id, aliases: [course] }
"#,
        )
        .unwrap();
        assert_eq!(checks.len(), 6);
        assert_eq!(checks[4], Check::MaxLength { at: String::new(), max: 10 });
        assert!(matches!(&checks[3], Check::IsNumber { optional: true, .. }));
        assert!(matches!(&checks[5], Check::IdsWithin { id_field, .. } if id_field == "/course/id"));
        assert_eq!(checks[0], Check::Status { expected: 200 });
        assert!(matches!(&checks[2], Check::Aggregate { tolerance, .. } if *tolerance == DEFAULT_TOLERANCE));
    }
}
