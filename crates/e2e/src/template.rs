//! `${alias}` references between fixtures, requests and the run token

use coursecheck_common::FixtureId;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Placeholder replaced by a token unique to one scenario run
pub const RUN_TOKEN: &str = "run";

/// Identifiers bound so far, plus the run token
#[derive(Debug, Clone)]
pub struct Bindings {
    run: String,
    ids: HashMap<String, FixtureId>,
}

impl Bindings {
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            ids: HashMap::new(),
        }
    }

    /// Bindings with a fresh random run token
    pub fn fresh() -> Self {
        let token = uuid::Uuid::new_v4().simple().to_string();
        Self::new(&token[..12])
    }

    pub fn run_token(&self) -> &str {
        &self.run
    }

    pub fn bind(&mut self, alias: impl Into<String>, id: FixtureId) {
        self.ids.insert(alias.into(), id);
    }

    pub fn id(&self, alias: &str) -> Option<&FixtureId> {
        self.ids.get(alias)
    }

    /// Resolve every placeholder inside a JSON value. A string that is
    /// exactly one fixture reference becomes the identifier with its JSON
    /// type preserved; references embedded in longer strings are spliced in.
    pub fn resolve_value(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::String(s) => match sole_reference(s) {
                Some(name) if name != RUN_TOKEN => Ok(self.lookup(name)?.to_json()),
                _ => Ok(Value::String(self.resolve_str(s)?)),
            },
            Value::Array(items) => items
                .iter()
                .map(|v| self.resolve_value(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, v) in map {
                    out.insert(key.clone(), self.resolve_value(v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Splice every placeholder of a string (paths, emails)
    pub fn resolve_str(&self, input: &str) -> Result<String, String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| format!("unterminated placeholder in '{}'", input))?;
            let name = alias_of(&after[..end]);
            if name == RUN_TOKEN {
                out.push_str(&self.run);
            } else {
                out.push_str(&self.lookup(name)?.to_string());
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn lookup(&self, alias: &str) -> Result<&FixtureId, String> {
        self.ids
            .get(alias)
            .ok_or_else(|| format!("reference to unknown fixture '{}'", alias))
    }
}

/// Fixture aliases referenced anywhere in a value (the run token excluded)
pub fn references(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect(value, &mut found);
    found
}

/// Fixture aliases referenced in a plain string
pub fn references_in(input: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_str(input, &mut found);
    found
}

fn collect(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => collect_str(s, found),
        Value::Array(items) => items.iter().for_each(|v| collect(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect(v, found)),
        _ => {}
    }
}

fn collect_str(input: &str, found: &mut BTreeSet<String>) {
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { return };
        let name = alias_of(&after[..end]);
        if name != RUN_TOKEN {
            found.insert(name.to_string());
        }
        rest = &after[end + 1..];
    }
}

/// `alias.id` and `alias` name the same fixture
fn alias_of(placeholder: &str) -> &str {
    let trimmed = placeholder.trim();
    trimmed.strip_suffix(".id").unwrap_or(trimmed)
}

fn sole_reference(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains('}') || inner.contains("${") {
        return None;
    }
    Some(alias_of(inner))
}
