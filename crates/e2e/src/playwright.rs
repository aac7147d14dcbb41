//! Playwright driver for browser walkthroughs
//!
//! A walkthrough is compiled into one Node script that launches the browser,
//! runs every step in order and reports a JSON status line.

use coursecheck_common::{BrowserConfig, HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

use crate::walkthrough::{WalkStep, WalkthroughSpec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn parse(name: &str) -> HarnessResult<Self> {
        match name {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(HarnessError::Config(format!("unknown browser '{}'", other))),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Outcome of one walkthrough
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkthroughResult {
    pub name: String,
    pub passed: bool,
    pub duration_ms: u64,
    /// Label of the step that failed
    pub failed_step: Option<String>,
    pub error: Option<String>,
    pub screenshots: Vec<PathBuf>,
}

/// Status line printed by the generated script
#[derive(Debug, Deserialize)]
struct ScriptStatus {
    success: bool,
    #[serde(default)]
    step: Option<usize>,
    #[serde(default)]
    error: Option<String>,
}

pub struct PlaywrightDriver {
    base_url: String,
    browser: Browser,
    headless: bool,
    viewport_width: u32,
    viewport_height: u32,
    settle_ms: u64,
    screenshot_dir: PathBuf,
}

impl PlaywrightDriver {
    pub fn new(base_url: &str, config: &BrowserConfig) -> HarnessResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            browser: Browser::parse(&config.browser)?,
            headless: config.headless,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            settle_ms: config.settle_ms,
            screenshot_dir: config.screenshot_dir.clone(),
        })
    }

    /// Check that Node and every package the walkthroughs' scripts require
    /// are installed
    pub async fn ensure_available(specs: &[WalkthroughSpec]) -> HarnessResult<()> {
        for module in required_modules(specs) {
            let status = Command::new("node")
                .args(["-e", &format!("require('{}')", module)])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;

            if !matches!(status, Ok(status) if status.success()) {
                return Err(HarnessError::Walkthrough(format!(
                    "Node package '{}' not found. Install with: npm install {} && npx playwright install",
                    module,
                    required_modules(specs).join(" ")
                )));
            }
        }
        Ok(())
    }

    /// Build the Node script for a whole walkthrough
    pub fn build_script(&self, spec: &WalkthroughSpec) -> String {
        let mut script = format!("const {{ {} }} = require('playwright');\n", self.browser.as_str());
        if has_assertions(spec) {
            script.push_str("const { expect } = require('@playwright/test');\n");
        }
        script.push_str(&format!(
            r#"
(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const baseUrl = {base_url};
  let step = 0;

  try {{
"#,
            browser = self.browser.as_str(),
            headless = self.headless,
            width = self.viewport_width,
            height = self.viewport_height,
            base_url = js(&self.base_url),
        ));

        for (i, step) in spec.steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n    step = {};\n", i + 1, step.label(), i));
            script.push_str(&self.step_to_js(step));
            script.push('\n');
        }

        script.push_str(
            r#"
    console.log(JSON.stringify({ success: true }));
  } catch (error) {
    console.log(JSON.stringify({ success: false, step, error: error.message }));
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    fn step_to_js(&self, step: &WalkStep) -> String {
        match step {
            WalkStep::Navigate { url } => format!(
                "    await page.goto(baseUrl + {});\n    await page.waitForTimeout({});",
                js(url),
                self.settle_ms
            ),
            WalkStep::Click { selector, timeout_ms } => format!(
                "    await page.click({}, {{ timeout: {} }});",
                js(selector),
                timeout_ms.unwrap_or(5000)
            ),
            WalkStep::Fill { selector, value } => {
                format!("    await page.fill({}, {});", js(selector), js(value))
            }
            WalkStep::Press { selector, key } => match selector {
                Some(sel) => format!("    await page.locator({}).press({});", js(sel), js(key)),
                None => format!("    await page.keyboard.press({});", js(key)),
            },
            WalkStep::Wait { selector, timeout_ms, state } => format!(
                "    await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                js(selector),
                state.as_str(),
                timeout_ms
            ),
            WalkStep::Sleep { ms } => format!("    await page.waitForTimeout({});", ms),
            WalkStep::Assert { selector, visible, text_contains } => {
                let mut lines = Vec::new();
                match visible {
                    Some(true) => lines.push(format!("    await expect(page.locator({})).toBeVisible();", js(selector))),
                    Some(false) => lines.push(format!("    await expect(page.locator({})).toBeHidden();", js(selector))),
                    None => {}
                }
                if let Some(text) = text_contains {
                    lines.push(format!(
                        "    await expect(page.locator({})).toContainText({});",
                        js(selector),
                        js(text)
                    ));
                }
                lines.join("\n")
            }
            WalkStep::Screenshot { name, full_page } => {
                let path = self.screenshot_path(name);
                format!(
                    "    await page.screenshot({{ path: {}, fullPage: {} }});",
                    js(&path.to_string_lossy()),
                    full_page
                )
            }
            WalkStep::Log { message } => format!("    console.error('[walkthrough] ' + {});", js(message)),
        }
    }

    fn screenshot_path(&self, name: &str) -> PathBuf {
        self.screenshot_dir.join(format!("{}.png", name))
    }

    /// Run one walkthrough. Harness problems (Node missing, IO) are errors;
    /// a failing step is a failed result.
    pub async fn run(&self, spec: &WalkthroughSpec) -> HarnessResult<WalkthroughResult> {
        let start = Instant::now();
        std::fs::create_dir_all(&self.screenshot_dir)?;

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("walkthrough.js");
        std::fs::write(&script_path, self.build_script(spec))?;
        debug!("Running walkthrough script: {}", script_path.display());

        let limit = Duration::from_millis(spec.timeout_ms);
        let output = tokio::time::timeout(
            limit,
            Command::new("node")
                .arg(&script_path)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| HarnessError::Timeout {
            method: "WALK".to_string(),
            url: spec.name.clone(),
            timeout: limit,
        })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let status = stdout
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str::<ScriptStatus>(line).ok());

        let (passed, failed_step, error) = match status {
            Some(s) if s.success && output.status.success() => (true, None, None),
            Some(s) => (
                false,
                s.step.and_then(|i| spec.steps.get(i)).map(WalkStep::label),
                s.error,
            ),
            None => (
                false,
                None,
                Some(format!(
                    "script exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )),
            ),
        };

        let screenshots = if passed {
            spec.steps
                .iter()
                .filter_map(|s| match s {
                    WalkStep::Screenshot { name, .. } => Some(self.screenshot_path(name)),
                    _ => None,
                })
                .collect()
        } else {
            Vec::new()
        };

        let result = WalkthroughResult {
            name: spec.name.clone(),
            passed,
            duration_ms: start.elapsed().as_millis() as u64,
            failed_step,
            error,
            screenshots,
        };
        info!(
            "{} walkthrough {} ({} ms)",
            if result.passed { "✓" } else { "✗" },
            result.name,
            result.duration_ms
        );
        Ok(result)
    }
}

fn has_assertions(spec: &WalkthroughSpec) -> bool {
    spec.steps.iter().any(|s| matches!(s, WalkStep::Assert { .. }))
}

/// Node packages the scripts for these walkthroughs load
fn required_modules(specs: &[WalkthroughSpec]) -> Vec<&'static str> {
    let mut modules = vec!["playwright"];
    if specs.iter().any(has_assertions) {
        modules.push("@playwright/test");
    }
    modules
}

/// JavaScript string literal
fn js(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
