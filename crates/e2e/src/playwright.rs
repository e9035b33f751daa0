//! Playwright browser automation
//!
//! Each scenario is compiled into a single Node script that drives one
//! headless page through every step. The script reports back over stdout as
//! marker-prefixed JSON lines, which keeps page console output, step results
//! and the final verdict apart from anything else Node prints.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::spec::{Check, Target, TestSpec, TestStep};

/// Prefix of every line the generated script reports on
pub const EVENT_MARKER: &str = "@@dashcheck@@ ";

/// Module the generated script requires
const PLAYWRIGHT_MODULE: &str = "@playwright/test";

/// Playwright browser handle
pub struct PlaywrightHandle {
    /// Base URL of the server
    base_url: String,

    /// Directory screenshots are written to
    artifacts_dir: PathBuf,

    /// Viewport dimensions
    viewport_width: u32,
    viewport_height: u32,

    /// Browser type
    browser: Browser,

    headless: bool,

    /// Node executable
    node_binary: PathBuf,

    /// `node_modules` holding `@playwright/test`
    node_modules: Option<PathBuf>,

    /// Allowance for browser launch on top of the step timeouts
    launch_timeout: Duration,

    /// Echo the page's console to stdout
    echo_console: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Result of executing a scenario step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// A message the page logged to its console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub level: String,
    pub text: String,
}

/// Progress reported by the generated script
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Console {
        level: String,
        text: String,
    },
    Log {
        message: String,
    },
    StepPassed {
        index: usize,
        name: String,
        duration_ms: u64,
    },
    StepFailed {
        index: usize,
        name: String,
        duration_ms: u64,
        error: String,
    },
    Done {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Everything one script run reported
#[derive(Debug, Clone, Default)]
pub struct ScriptOutcome {
    pub steps: Vec<StepResult>,
    pub console: Vec<ConsoleMessage>,
    /// `Some` once the script reported its verdict
    pub success: Option<bool>,
    pub error: Option<String>,
}

impl ScriptOutcome {
    /// The step that failed, if any
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success)
    }

    fn record(&mut self, event: ScriptEvent, echo_console: bool) {
        match event {
            ScriptEvent::Console { level, text } => {
                if echo_console {
                    println!("Browser console: {}", text);
                }
                debug!("[browser:{}] {}", level, text);
                self.console.push(ConsoleMessage { level, text });
            }
            ScriptEvent::Log { message } => {
                info!("[SCENARIO LOG] {}", message);
            }
            ScriptEvent::StepPassed { index, name, duration_ms } => {
                debug!("✓ step {} {} ({} ms)", index + 1, name, duration_ms);
                self.steps.push(StepResult {
                    index,
                    success: true,
                    step_name: name,
                    duration_ms,
                    error: None,
                    screenshot_path: None,
                });
            }
            ScriptEvent::StepFailed { index, name, duration_ms, error } => {
                let error = strip_ansi(&error);
                warn!("✗ step {} {}: {}", index + 1, name, error);
                self.steps.push(StepResult {
                    index,
                    success: false,
                    step_name: name,
                    duration_ms,
                    error: Some(error),
                    screenshot_path: None,
                });
            }
            ScriptEvent::Done { success, error } => {
                self.success = Some(success);
                self.error = error.map(|e| strip_ansi(&e));
            }
        }
    }
}

/// Parse one stdout line; `None` for anything that is not a script event
pub fn parse_event(line: &str) -> Option<ScriptEvent> {
    let payload = line.strip_prefix(EVENT_MARKER)?;
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Malformed script event {:?}: {}", payload, e);
            None
        }
    }
}

fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let ansi = ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ANSI pattern"));
    ansi.replace_all(text, "").into_owned()
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        let artifacts_dir = absolute(&config.artifacts_dir)?;
        std::fs::create_dir_all(&artifacts_dir)?;

        let node_modules = match &config.node_modules {
            Some(dir) => Some(absolute(dir)?),
            None => None,
        };

        Ok(Self {
            base_url: config.base_url,
            artifacts_dir,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            browser: config.browser,
            headless: config.headless,
            node_binary: config.node_binary,
            node_modules,
            launch_timeout: Duration::from_millis(config.launch_timeout_ms),
            echo_console: config.echo_console,
        })
    }

    /// Where a scenario's screenshot path ends up on disk
    pub fn artifact_path(&self, relative: &Path) -> PathBuf {
        self.artifacts_dir.join(relative)
    }

    fn node_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.node_binary);
        if let Some(dir) = &self.node_modules {
            cmd.env("NODE_PATH", dir);
        }
        cmd
    }

    /// Check that Node can resolve the Playwright test package
    pub async fn verify_installation(&self) -> E2eResult<()> {
        let status = self
            .node_command()
            .args(["-e", &format!("require.resolve('{}')", PLAYWRIGHT_MODULE)])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Build the Playwright script for a whole scenario
    pub fn build_script(&self, spec: &TestSpec) -> String {
        let mut steps = String::new();
        for (i, step) in spec.steps.iter().enumerate() {
            let comment = step.name().replace(['\n', '\r'], " ");
            steps.push_str(&format!("\n    // Step {}: {}\n", i + 1, comment));
            steps.push_str(&format!(
                "    await step({}, {}, async () => {{\n{}\n    }});\n",
                i,
                js_str(&step.name()),
                self.step_to_js(step)
            ));
        }

        let (width, height) = spec
            .viewport
            .as_ref()
            .map(|v| (v.width, v.height))
            .unwrap_or((self.viewport_width, self.viewport_height));

        SCRIPT_TEMPLATE
            .replace("__MODULE__", &js_str(PLAYWRIGHT_MODULE))
            .replace("__MARKER__", &js_str(EVENT_MARKER))
            .replace("__BROWSER__", self.browser.as_str())
            .replace("__HEADLESS__", if self.headless { "true" } else { "false" })
            .replace("__WIDTH__", &width.to_string())
            .replace("__HEIGHT__", &height.to_string())
            .replace("__BASE_URL__", &js_str(&self.base_url))
            .replace("__STEPS__", &steps)
    }

    /// Convert a step to JavaScript code
    fn step_to_js(&self, step: &TestStep) -> String {
        match step {
            TestStep::Navigate { url, wait_for, timeout_ms } => {
                let mut js = format!(
                    "      await page.goto(baseUrl + {}, {{ timeout: {} }});",
                    js_str(url),
                    timeout_ms
                );
                if let Some(target) = wait_for {
                    js.push_str(&format!(
                        "\n      await expect({}).toBeVisible({{ timeout: {} }});",
                        locator_js(target),
                        timeout_ms
                    ));
                }
                js
            }
            TestStep::Click { target, timeout_ms } => {
                format!(
                    "      await {}.click({{ timeout: {} }});",
                    locator_js(target),
                    timeout_ms
                )
            }
            TestStep::Fill { target, value, timeout_ms } => {
                format!(
                    "      await {}.fill({}, {{ timeout: {} }});",
                    locator_js(target),
                    js_str(value),
                    timeout_ms
                )
            }
            TestStep::Press { target, key, timeout_ms } => match target {
                Some(target) => format!(
                    "      await {}.press({}, {{ timeout: {} }});",
                    locator_js(target),
                    js_str(key),
                    timeout_ms
                ),
                None => format!("      await page.keyboard.press({});", js_str(key)),
            },
            TestStep::Wait { target, state, timeout_ms } => {
                format!(
                    "      await {}.waitFor({{ state: '{}', timeout: {} }});",
                    locator_js(target),
                    state.as_str(),
                    timeout_ms
                )
            }
            TestStep::Assert { target, timeout_ms, expect } => {
                // Fixtures were validated when the scenario was loaded
                let checks = expect.checks().unwrap_or_default();
                let locator = locator_js(target);
                checks
                    .iter()
                    .map(|check| check_to_js(&locator, check, *timeout_ms))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            TestStep::Screenshot { path, full_page } => {
                let path = self.artifact_path(path);
                format!(
                    "      await page.screenshot({{ path: {}, fullPage: {} }});",
                    js_str(&path.to_string_lossy()),
                    full_page
                )
            }
            TestStep::Log { message } => {
                format!("      emit({{ event: 'log', message: {} }});", js_str(message))
            }
        }
    }

    /// Upper bound on how long a scenario's script may run
    pub fn script_timeout(&self, spec: &TestSpec) -> Duration {
        let steps: u64 = spec.steps.iter().map(step_budget_ms).sum();
        self.launch_timeout + Duration::from_millis(steps)
    }

    /// Run a scenario in a fresh browser and collect what the script reports
    pub async fn run_spec(&self, spec: &TestSpec) -> E2eResult<ScriptOutcome> {
        for path in spec.screenshot_paths() {
            if let Some(parent) = self.artifact_path(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let script = self.build_script(spec);
        self.run_script(&spec.name, &script, self.script_timeout(spec)).await
    }

    /// Execute a generated script via Node
    pub async fn run_script(&self, name: &str, script: &str, budget: Duration) -> E2eResult<ScriptOutcome> {
        // Write script to temp file
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut child = self
            .node_command()
            .arg(&script_path)
            .current_dir(temp_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!("Failed to spawn {}: {}", self.node_binary.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("script stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| E2eError::Playwright("script stderr unavailable".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buf).await;
            buf
        });

        let mut outcome = ScriptOutcome::default();
        let echo_console = self.echo_console;
        let mut lines = BufReader::new(stdout).lines();
        let read_events = async {
            while let Some(line) = lines.next_line().await? {
                match parse_event(&line) {
                    Some(event) => outcome.record(event, echo_console),
                    None => debug!("[node] {}", line),
                }
            }
            Ok::<_, E2eError>(())
        };

        match timeout(budget, read_events).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(E2eError::Timeout(format!(
                    "scenario '{}' to finish within {:?}",
                    name, budget
                )));
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if outcome.success.is_none() {
            return Err(E2eError::Playwright(format!(
                "script exited ({}) without reporting a result\nstderr: {}",
                status,
                stderr.trim()
            )));
        }

        if !stderr.trim().is_empty() {
            debug!("Script stderr: {}", stderr.trim());
        }

        Ok(outcome)
    }
}

/// Build the Playwright locator expression for a target
pub fn locator_js(target: &Target) -> String {
    let mut js = match &target.within {
        Some(parent) => locator_js(parent),
        None => "page".to_string(),
    };

    if let Some(css) = &target.css {
        js.push_str(&format!(".locator({})", js_str(css)));
    }
    if let Some(role) = &target.role {
        match &target.name {
            Some(name) => js.push_str(&format!(
                ".getByRole({}, {{ name: {}, exact: {} }})",
                js_str(role),
                js_str(name),
                target.exact
            )),
            None => js.push_str(&format!(".getByRole({})", js_str(role))),
        }
    }
    if let Some(label) = &target.label {
        js.push_str(&format!(
            ".getByLabel({}, {{ exact: {} }})",
            js_str(label),
            target.exact
        ));
    }
    if let Some(text) = &target.text {
        js.push_str(&format!(
            ".getByText({}, {{ exact: {} }})",
            js_str(text),
            target.exact
        ));
    }
    if let Some(has) = &target.has {
        let pattern = format!(r"^\s*{}\s*$", regex::escape(&has.text));
        js.push_str(&format!(
            ".filter({{ has: page.locator({}, {{ hasText: {} }}) }})",
            js_str(&has.css),
            js_regex(&pattern)
        ));
    }
    match target.nth {
        Some(0) => js.push_str(".first()"),
        Some(-1) => js.push_str(".last()"),
        Some(n) => js.push_str(&format!(".nth({})", n)),
        None => {}
    }

    js
}

fn check_to_js(locator: &str, check: &Check, timeout_ms: u64) -> String {
    let assertion = match check {
        Check::Visible(true) => "toBeVisible()".to_string(),
        Check::Visible(false) => "toBeHidden()".to_string(),
        Check::Text(text) => format!("toHaveText({})", js_str(text)),
        Check::TextContains(text) => format!("toContainText({})", js_str(text)),
        Check::NotText(text) => format!("not.toHaveText({})", js_str(text)),
        Check::Class(class) => format!("toHaveClass({})", js_str(class)),
        Check::HasClass(class) => {
            let pattern = format!(r"(^|\s){}(\s|$)", regex::escape(class));
            format!("toHaveClass({})", js_regex(&pattern))
        }
        Check::NoGradient => format!("not.toHaveClass({})", js_regex(r"(^|\s)gradient-\d+(\s|$)")),
        Check::Count(count) => format!("toHaveCount({})", count),
    };

    // Playwright assertions take the timeout as their last argument
    let assertion = match assertion.strip_suffix(')') {
        Some(call) if call.ends_with('(') => format!("{}{{ timeout: {} }})", call, timeout_ms),
        Some(call) => format!("{}, {{ timeout: {} }})", call, timeout_ms),
        None => assertion,
    };

    format!("      await expect({}).{};", locator, assertion)
}

/// Worst-case wait of one step, in milliseconds
fn step_budget_ms(step: &TestStep) -> u64 {
    match step {
        TestStep::Navigate { wait_for, timeout_ms, .. } => {
            timeout_ms * if wait_for.is_some() { 2 } else { 1 }
        }
        TestStep::Assert { timeout_ms, expect, .. } => {
            let checks = expect.checks().map(|c| c.len()).unwrap_or(1).max(1) as u64;
            timeout_ms * checks
        }
        other => other.timeout_ms(),
    }
}

/// JavaScript string literal
fn js_str(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// JavaScript `RegExp` built from a pattern string
fn js_regex(pattern: &str) -> String {
    format!("new RegExp({})", js_str(pattern))
}

fn absolute(path: &Path) -> E2eResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

const SCRIPT_TEMPLATE: &str = r#"
const { chromium, firefox, webkit, expect } = require(__MODULE__);

const MARKER = __MARKER__;
const emit = (event) => process.stdout.write(MARKER + JSON.stringify(event) + '\n');
const describe = (error) => String((error && error.message) || error);

async function step(index, name, body) {
  const started = Date.now();
  try {
    await body();
  } catch (error) {
    emit({ event: 'step_failed', index, name, duration_ms: Date.now() - started, error: describe(error) });
    throw error;
  }
  emit({ event: 'step_passed', index, name, duration_ms: Date.now() - started });
}

(async () => {
  const browser = await __BROWSER__.launch({ headless: __HEADLESS__ });
  try {
    const context = await browser.newContext({
      viewport: { width: __WIDTH__, height: __HEIGHT__ }
    });
    const page = await context.newPage();
    page.on('console', (msg) => emit({ event: 'console', level: msg.type(), text: msg.text() }));
    const baseUrl = __BASE_URL__;
__STEPS__
    emit({ event: 'done', success: true });
  } catch (error) {
    emit({ event: 'done', success: false, error: describe(error) });
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})().catch((error) => {
  emit({ event: 'done', success: false, error: describe(error) });
  process.exitCode = 1;
});
"#;

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub artifacts_dir: PathBuf,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,
    pub node_binary: PathBuf,
    pub node_modules: Option<PathBuf>,
    pub launch_timeout_ms: u64,
    pub echo_console: bool,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            artifacts_dir: PathBuf::from("test-results/screenshots"),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
            node_binary: PathBuf::from("node"),
            node_modules: Some(PathBuf::from("node_modules")),
            launch_timeout_ms: 30_000,
            echo_console: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Expectation, HasChild};

    fn handle() -> PlaywrightHandle {
        let dir = std::env::temp_dir().join("dashcheck-playwright-tests");
        PlaywrightHandle::new(PlaywrightConfig {
            artifacts_dir: dir,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_structural_locator() {
        let target = Target::css("td")
            .nth(-1)
            .within(Target::css(".data-table tbody tr:nth-child(2)"));
        assert_eq!(
            locator_js(&target),
            r#"page.locator(".data-table tbody tr:nth-child(2)").locator("td").last()"#
        );
    }

    #[test]
    fn test_role_and_label_locators() {
        assert_eq!(
            locator_js(&Target::role("cell", "0.001")),
            r#"page.getByRole("cell", { name: "0.001", exact: false })"#
        );
        assert_eq!(
            locator_js(&Target::label("Low Price Threshold (Red):")),
            r#"page.getByLabel("Low Price Threshold (Red):", { exact: false })"#
        );
    }

    #[test]
    fn test_has_child_filter() {
        let target = Target {
            css: Some(".asset-card".to_string()),
            has: Some(HasChild {
                css: ".asset-name".to_string(),
                text: "BTC".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(
            locator_js(&target),
            r#"page.locator(".asset-card").filter({ has: page.locator(".asset-name", { hasText: new RegExp("^\\s*BTC\\s*$") }) })"#
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        let js = locator_js(&Target::css(r#"td[title="it's"]"#));
        assert_eq!(js, r#"page.locator("td[title=\"it's\"]")"#);
    }

    #[test]
    fn test_check_timeouts() {
        let loc = "page.locator(\".asset-card\")";
        assert_eq!(
            check_to_js(loc, &Check::Count(10), 15000),
            "      await expect(page.locator(\".asset-card\")).toHaveCount(10, { timeout: 15000 });"
        );
        assert_eq!(
            check_to_js(loc, &Check::Visible(true), 5000),
            "      await expect(page.locator(\".asset-card\")).toBeVisible({ timeout: 5000 });"
        );
        assert_eq!(
            check_to_js(loc, &Check::NotText("0.675".to_string()), 5000),
            "      await expect(page.locator(\".asset-card\")).not.toHaveText(\"0.675\", { timeout: 5000 });"
        );
    }

    #[test]
    fn test_has_class_is_token_match() {
        let js = check_to_js("loc", &Check::HasClass("gradient-2".to_string()), 5000);
        assert_eq!(
            js,
            r#"      await expect(loc).toHaveClass(new RegExp("(^|\\s)gradient\\-2(\\s|$)"), { timeout: 5000 });"#
        );
    }

    #[test]
    fn test_build_script_runs_all_steps_in_one_page() {
        let spec = TestSpec {
            name: "thresholds".to_string(),
            description: String::new(),
            tags: vec![],
            viewport: Some(crate::spec::Viewport { width: 1024, height: 768 }),
            steps: vec![
                TestStep::Navigate {
                    url: "/".to_string(),
                    wait_for: Some(Target::css(".data-table")),
                    timeout_ms: 10000,
                },
                TestStep::Click {
                    target: Target::role("button", "Settings"),
                    timeout_ms: 5000,
                },
                TestStep::Assert {
                    target: Target::role("cell", "0.001"),
                    timeout_ms: 5000,
                    expect: Expectation {
                        class: Some("gradient-1".to_string()),
                        ..Default::default()
                    },
                },
                TestStep::Screenshot {
                    path: PathBuf::from("final.png"),
                    full_page: true,
                },
            ],
        };

        let pw = handle();
        let script = pw.build_script(&spec);

        assert!(script.contains("require(\"@playwright/test\")"));
        assert!(script.contains("chromium.launch({ headless: true })"));
        assert!(script.contains("viewport: { width: 1024, height: 768 }"));
        assert_eq!(script.matches("browser.newContext").count(), 1);
        assert_eq!(script.matches("await step(").count(), 4);
        assert!(script.contains("await page.goto(baseUrl + \"/\", { timeout: 10000 });"));
        assert!(script.contains("toHaveClass(\"gradient-1\", { timeout: 5000 })"));
        assert!(script.contains("finally {\n    await browser.close();"));
        assert!(script.contains(&js_str(&pw.artifact_path(Path::new("final.png")).to_string_lossy())));

        // 30s launch + 2 * 10s navigate + 5s click + 5s assert + 5s screenshot
        assert_eq!(pw.script_timeout(&spec), Duration::from_secs(65));
    }

    #[test]
    fn test_parse_events() {
        let line = format!(
            "{}{}",
            EVENT_MARKER,
            r#"{"event":"step_failed","index":2,"name":"assert:td","duration_ms":12,"error":"\u001b[31mExpected\u001b[39m gradient-2"}"#
        );
        let event = parse_event(&line).unwrap();

        let mut outcome = ScriptOutcome::default();
        outcome.record(event, false);
        let failed = outcome.failed_step().unwrap();
        assert_eq!(failed.index, 2);
        assert_eq!(failed.error.as_deref(), Some("Expected gradient-2"));

        assert_eq!(parse_event("plain node output"), None);
        assert_eq!(parse_event(&format!("{}{{not json", EVENT_MARKER)), None);
    }

    #[test]
    fn test_console_events_are_collected() {
        let mut outcome = ScriptOutcome::default();
        outcome.record(
            ScriptEvent::Console {
                level: "log".to_string(),
                text: "SW registered".to_string(),
            },
            false,
        );
        outcome.record(ScriptEvent::Done { success: true, error: None }, false);

        assert_eq!(outcome.console.len(), 1);
        assert_eq!(outcome.success, Some(true));
        assert!(outcome.failed_step().is_none());
    }
}
