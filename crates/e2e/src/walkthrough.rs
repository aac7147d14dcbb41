//! Declarative browser walkthroughs (sign-in, course authoring, dashboards, admin flows)
//!
//! A walkthrough is a straight sequence of UI steps. Steps are never retried;
//! a failed step fails the walkthrough.

use coursecheck_common::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A browser walkthrough parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkthroughSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub steps: Vec<WalkStep>,

    /// Bound on the whole walkthrough
    #[serde(default = "default_walk_timeout")]
    pub timeout_ms: u64,
}

fn default_walk_timeout() -> u64 {
    120_000
}

/// A single UI step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WalkStep {
    /// Navigate to a URL relative to the base URL, then wait the settle time
    Navigate { url: String },

    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    Fill { selector: String, value: String },

    /// Press a key, on an element or the page
    Press {
        #[serde(default)]
        selector: Option<String>,
        key: String,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Fixed-duration wait for the UI to settle
    Sleep { ms: u64 },

    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text_contains: Option<String>,
    },

    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },

    Log { message: String },
}

fn default_wait_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl WalkStep {
    /// Short label used in logs and failure messages
    pub fn label(&self) -> String {
        match self {
            WalkStep::Navigate { url } => format!("navigate:{}", url),
            WalkStep::Click { selector, .. } => format!("click:{}", selector),
            WalkStep::Fill { selector, .. } => format!("fill:{}", selector),
            WalkStep::Press { key, .. } => format!("press:{}", key),
            WalkStep::Wait { selector, .. } => format!("wait:{}", selector),
            WalkStep::Sleep { ms } => format!("sleep:{}ms", ms),
            WalkStep::Assert { selector, .. } => format!("assert:{}", selector),
            WalkStep::Screenshot { name, .. } => format!("screenshot:{}", name),
            WalkStep::Log { message } => format!("log:{}", message.chars().take(30).collect::<String>()),
        }
    }
}

impl WalkthroughSpec {
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        if spec.steps.is_empty() {
            return Err(HarnessError::SpecParse(format!(
                "walkthrough '{}' has no steps",
                spec.name
            )));
        }
        Ok(spec)
    }

    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| HarnessError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all walkthroughs below a directory, sorted by name
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_login_walkthrough() {
        let yaml = r#"
name: login
description: Sign in with valid credentials
tags: [auth]
steps:
  - action: navigate
    url: /login
  - action: fill
    selector: 'input[type="email"]'
    value: instructor@example.com
  - action: click
    selector: 'button[type="submit"]'
  - action: wait
    selector: '[data-testid="dashboard"]'
    timeout_ms: 10000
  - action: assert
    selector: h1
    text_contains: Dashboard
"#;
        let spec = WalkthroughSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.steps.len(), 5);
        assert_eq!(spec.timeout_ms, 120_000);
        assert_eq!(
            spec.steps[3],
            WalkStep::Wait {
                selector: "[data-testid=\"dashboard\"]".to_string(),
                timeout_ms: 10_000,
                state: WaitState::Visible,
            }
        );
        assert_eq!(spec.steps[0].label(), "navigate:/login");
    }

    #[test]
    fn rejects_empty_walkthrough() {
        assert!(WalkthroughSpec::from_yaml("name: nothing\nsteps: []\n").is_err());
    }
}
