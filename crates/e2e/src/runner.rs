//! Main test runner that orchestrates the file server, Playwright and artifacts

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::playwright::{ConsoleMessage, PlaywrightConfig, PlaywrightHandle, StepResult};
use crate::server::{ServerConfig, ServerHandle};
use crate::spec::{TestSpec, TestStep};

/// Where a verification run has got to.
///
/// A failure at any point skips the remaining phases; the server is torn
/// down regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    NotStarted,
    ServerStarting,
    PageLoaded,
    InitialAssertionsPassed,
    InteractionApplied,
    PostInteractionAssertionsPassed,
    ArtifactCaptured,
    TornDown,
}

impl RunPhase {
    /// Phase reached once `step` has passed
    pub fn after(self, step: &TestStep) -> RunPhase {
        use RunPhase::*;

        if self == TornDown {
            return self;
        }

        match step {
            TestStep::Navigate { .. } => self.max(PageLoaded),
            TestStep::Assert { .. } | TestStep::Wait { .. } => match self {
                PageLoaded | InitialAssertionsPassed => InitialAssertionsPassed,
                InteractionApplied | PostInteractionAssertionsPassed => PostInteractionAssertionsPassed,
                other => other,
            },
            TestStep::Click { .. } | TestStep::Fill { .. } | TestStep::Press { .. } => match self {
                NotStarted | ServerStarting | ArtifactCaptured => self,
                _ => InteractionApplied,
            },
            TestStep::Screenshot { .. } => ArtifactCaptured,
            TestStep::Log { .. } => self,
        }
    }
}

/// A screenshot written by a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    /// Furthest phase the scenario reached
    pub phase: RunPhase,
    pub steps: Vec<StepResult>,
    pub artifacts: Vec<Artifact>,
    pub console: Vec<ConsoleMessage>,
    pub error: Option<String>,
}

impl TestResult {
    fn errored(name: &str, error: &E2eError) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms: 0,
            phase: RunPhase::ServerStarting,
            steps: vec![],
            artifacts: vec![],
            console: vec![],
            error: Some(error.to_string()),
        }
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(started_at: DateTime<Utc>, duration_ms: u64, results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            started_at,
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Main verification runner
pub struct TestRunner {
    /// Server configuration
    server_config: ServerConfig,

    /// Playwright configuration
    playwright_config: PlaywrightConfig,

    /// Running server handle (if any)
    server: Option<ServerHandle>,

    /// Scenario directory
    scenarios_dir: PathBuf,

    /// Output directory for results
    output_dir: PathBuf,

    /// Check for `@playwright/test` before the first scenario
    check_install: bool,

    phase: RunPhase,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            server_config: config.server,
            playwright_config: config.playwright,
            server: None,
            scenarios_dir: config.scenarios_dir,
            output_dir: config.output_dir,
            check_install: config.check_install,
            phase: RunPhase::NotStarted,
        }
    }

    /// Phase of the run as a whole
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// The running server, if started
    pub fn server(&self) -> Option<&ServerHandle> {
        self.server.as_ref()
    }

    /// Start the server
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(()); // Already running
        }

        self.phase = RunPhase::ServerStarting;
        let server = ServerHandle::spawn(self.server_config.clone()).await?;

        // Point the browser at the actual server URL
        self.playwright_config.base_url = server.base_url().to_string();

        self.server = Some(server);
        Ok(())
    }

    /// Stop the server
    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        if self.phase != RunPhase::NotStarted {
            self.phase = RunPhase::TornDown;
        }
        Ok(())
    }

    /// Run all scenarios in the scenario directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.scenarios_dir)?;
        self.run_specs(&specs).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.scenarios_dir)?;
        let filtered: Vec<TestSpec> = TestSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.scenarios_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Scenario not found: {}", name)))?;

        self.run_specs(std::slice::from_ref(&spec)).await
    }

    /// Stop the server without blocking the runtime
    pub async fn shutdown_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.shutdown().await?;
        }
        if self.phase != RunPhase::NotStarted {
            self.phase = RunPhase::TornDown;
        }
        Ok(())
    }

    /// Run a list of scenarios, then tear the server down whatever happened
    pub async fn run_specs(&mut self, specs: &[TestSpec]) -> E2eResult<TestSuiteResult> {
        let result = self.run_specs_inner(specs).await;
        let stopped = self.shutdown_server().await;
        let suite = result?;
        stopped?;
        Ok(suite)
    }

    async fn run_specs_inner(&mut self, specs: &[TestSpec]) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();

        self.start_server().await?;

        let playwright = PlaywrightHandle::new(self.playwright_config.clone())?;
        if self.check_install {
            playwright.verify_installation().await?;
        }

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            let result = match self.run_spec(&playwright, spec).await {
                Ok(result) => result,
                Err(e) => TestResult::errored(&spec.name, &e),
            };

            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let suite = TestSuiteResult::from_results(started_at, start.elapsed().as_millis() as u64, results);

        info!(
            "Results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );

        Ok(suite)
    }

    /// Run a single scenario against the running server
    pub async fn run_spec(&self, playwright: &PlaywrightHandle, spec: &TestSpec) -> E2eResult<TestResult> {
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        // Leftovers from an earlier run must not pass for this run's artifacts
        let screenshots: Vec<PathBuf> = spec
            .screenshot_paths()
            .into_iter()
            .map(|path| playwright.artifact_path(path))
            .collect();
        remove_artifacts(&screenshots)?;

        let outcome = match playwright.run_spec(spec).await {
            Ok(outcome) => outcome,
            Err(e) => {
                remove_artifacts(&screenshots)?;
                return Err(e);
            }
        };

        let mut phase = RunPhase::ServerStarting;
        let mut steps = outcome.steps.clone();
        let mut test_error: Option<String> = None;

        for result in &mut steps {
            let Some(step) = spec.steps.get(result.index) else {
                warn!("Script reported unknown step index {}", result.index);
                continue;
            };

            if !result.success {
                let reason = result.error.clone().unwrap_or_else(|| "unknown error".to_string());
                let err = match step {
                    TestStep::Assert { .. } => {
                        E2eError::AssertionFailed(format!("{} - {}", result.step_name, reason))
                    }
                    _ => E2eError::StepFailed {
                        step: result.step_name.clone(),
                        reason,
                    },
                };
                test_error = Some(err.to_string());
                break; // Stop on first failure
            }

            if let TestStep::Screenshot { path, .. } = step {
                result.screenshot_path = Some(playwright.artifact_path(path));
            }
            phase = phase.after(step);
        }

        if test_error.is_none() && outcome.success != Some(true) {
            test_error = Some(
                E2eError::Playwright(outcome.error.clone().unwrap_or_else(|| "scenario failed".to_string()))
                    .to_string(),
            );
        }

        // Screenshots are only kept from fully passing scenarios
        let mut artifacts = Vec::new();
        if test_error.is_none() {
            for path in &screenshots {
                match capture_artifact(path) {
                    Ok(artifact) => artifacts.push(artifact),
                    Err(e) => {
                        test_error = Some(e.to_string());
                        break;
                    }
                }
            }
        }
        if test_error.is_some() {
            artifacts.clear();
            for result in &mut steps {
                result.screenshot_path = None;
            }
            remove_artifacts(&screenshots)?;
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        Ok(TestResult {
            name: spec.name.clone(),
            success: test_error.is_none(),
            duration_ms,
            phase,
            steps,
            artifacts,
            console: outcome.console,
            error: test_error,
        })
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

/// Delete screenshot files; missing ones are fine
pub fn remove_artifacts(paths: &[PathBuf]) -> E2eResult<()> {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(E2eError::ArtifactCapture(format!(
                    "cannot remove {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
    Ok(())
}

/// Confirm a screenshot landed on disk and fingerprint it
pub fn capture_artifact(path: &Path) -> E2eResult<Artifact> {
    let data = std::fs::read(path).map_err(|e| {
        E2eError::ArtifactCapture(format!("{}: {}", path.display(), e))
    })?;
    if data.is_empty() {
        return Err(E2eError::ArtifactCapture(format!("{} is empty", path.display())));
    }

    let mut hasher = Sha256::new();
    hasher.update(&data);

    Ok(Artifact {
        path: path.to_path_buf(),
        bytes: data.len() as u64,
        sha256: hex::encode(hasher.finalize()),
    })
}

/// Configuration for the test runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub server: ServerConfig,
    pub playwright: PlaywrightConfig,
    pub scenarios_dir: PathBuf,
    pub output_dir: PathBuf,
    pub check_install: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            playwright: PlaywrightConfig::default(),
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
            check_install: true,
        }
    }
}

impl RunnerConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            E2eError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Expectation, Target};

    fn assert_step() -> TestStep {
        TestStep::Assert {
            target: Target::css(".data-table"),
            timeout_ms: 5000,
            expect: Expectation {
                visible: Some(true),
                ..Default::default()
            },
        }
    }

    fn navigate() -> TestStep {
        TestStep::Navigate {
            url: "/".to_string(),
            wait_for: None,
            timeout_ms: 5000,
        }
    }

    fn click() -> TestStep {
        TestStep::Click {
            target: Target::role("button", "Settings"),
            timeout_ms: 5000,
        }
    }

    fn screenshot() -> TestStep {
        TestStep::Screenshot {
            path: PathBuf::from("final.png"),
            full_page: true,
        }
    }

    fn walk(steps: &[TestStep]) -> Vec<RunPhase> {
        let mut phase = RunPhase::ServerStarting;
        steps
            .iter()
            .map(|step| {
                phase = phase.after(step);
                phase
            })
            .collect()
    }

    #[test]
    fn test_settings_scenario_phases() {
        let phases = walk(&[navigate(), assert_step(), click(), assert_step(), screenshot()]);
        assert_eq!(
            phases,
            vec![
                RunPhase::PageLoaded,
                RunPhase::InitialAssertionsPassed,
                RunPhase::InteractionApplied,
                RunPhase::PostInteractionAssertionsPassed,
                RunPhase::ArtifactCaptured,
            ]
        );
    }

    #[test]
    fn test_read_only_scenario_phases() {
        let phases = walk(&[navigate(), assert_step(), assert_step(), screenshot()]);
        assert_eq!(phases.last(), Some(&RunPhase::ArtifactCaptured));
        assert_eq!(phases[2], RunPhase::InitialAssertionsPassed);
    }

    #[test]
    fn test_torn_down_is_terminal() {
        assert_eq!(RunPhase::TornDown.after(&navigate()), RunPhase::TornDown);
        assert_eq!(RunPhase::TornDown.after(&screenshot()), RunPhase::TornDown);
    }

    #[test]
    fn test_interaction_before_page_load_does_not_advance() {
        assert_eq!(RunPhase::ServerStarting.after(&click()), RunPhase::ServerStarting);
    }

    #[test]
    fn test_capture_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");

        let err = capture_artifact(&path).unwrap_err();
        assert!(matches!(err, E2eError::ArtifactCapture(_)));

        std::fs::write(&path, b"").unwrap();
        assert!(capture_artifact(&path).is_err());

        std::fs::write(&path, b"png").unwrap();
        let artifact = capture_artifact(&path).unwrap();
        assert_eq!(artifact.bytes, 3);
        assert_eq!(artifact.sha256.len(), 64);
        assert!(artifact.sha256.chars().all(|c| c.is_ascii_hexdigit()));

        let copy = dir.path().join("copy.png");
        std::fs::write(&copy, b"png").unwrap();
        assert_eq!(capture_artifact(&copy).unwrap().sha256, artifact.sha256);
    }

    #[test]
    fn test_remove_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("stale.png");
        std::fs::write(&stale, b"old").unwrap();

        remove_artifacts(&[stale.clone(), dir.path().join("missing.png")]).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_suite_counts() {
        let ok = TestResult {
            name: "a".to_string(),
            success: true,
            duration_ms: 1,
            phase: RunPhase::ArtifactCaptured,
            steps: vec![],
            artifacts: vec![],
            console: vec![],
            error: None,
        };
        let failed = TestResult::errored("b", &E2eError::Timeout("grid".to_string()));

        let suite = TestSuiteResult::from_results(Utc::now(), 2, vec![ok, failed]);
        assert_eq!(suite.total, 2);
        assert_eq!(suite.passed, 1);
        assert_eq!(suite.failed, 1);
        assert!(!suite.all_passed());
    }

    #[test]
    fn test_runner_config_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashcheck.toml");
        std::fs::write(
            &path,
            r#"
scenarios_dir = "checks"

[server]
root_dir = "site"
port = 8000

[playwright]
browser = "firefox"
launch_timeout_ms = 60000
"#,
        )
        .unwrap();

        let config = RunnerConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.scenarios_dir, PathBuf::from("checks"));
        assert_eq!(config.output_dir, PathBuf::from("test-results"));
        assert_eq!(config.server.port, Some(8000));
        assert_eq!(config.playwright.browser, crate::playwright::Browser::Firefox);
        assert_eq!(config.playwright.viewport_width, 1280);
        assert!(config.check_install);
    }

    #[test]
    fn test_stop_server_without_start_stays_not_started() {
        let mut runner = TestRunner::new();
        runner.stop_server().unwrap();
        assert_eq!(runner.phase(), RunPhase::NotStarted);
    }
}
