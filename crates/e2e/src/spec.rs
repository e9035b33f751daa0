//! Declarative YAML scenarios
//!
//! A scenario is the fixture table for one verification run: which elements
//! to locate, what they must show, and which interactions come in between.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use dashcheck_common::{format_multiplier, format_risk_level, gradient_bucket, risk_level, Thresholds};

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser, overriding the run's default
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// How to find an element on the page.
///
/// Fields narrow each other in the order css, role/name, label, text, has,
/// nth. `within` scopes the whole lookup to a parent target. Targets are
/// resolved again on every step, so a re-rendered element is found afresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub css: Option<String>,

    /// ARIA role, e.g. `button` or `cell`
    #[serde(default)]
    pub role: Option<String>,

    /// Accessible name, only together with `role`
    #[serde(default)]
    pub name: Option<String>,

    /// Text of the associated `<label>`
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub text: Option<String>,

    /// Require whole-string matches for name, label and text
    #[serde(default)]
    pub exact: bool,

    /// Keep only matches containing a descendant with exactly this text
    #[serde(default)]
    pub has: Option<HasChild>,

    /// 0 is the first match, -1 the last
    #[serde(default)]
    pub nth: Option<i32>,

    #[serde(default)]
    pub within: Option<Box<Target>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasChild {
    pub css: String,
    pub text: String,
}

impl Target {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            css: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn nth(mut self, index: i32) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn within(mut self, parent: Target) -> Self {
        self.within = Some(Box::new(parent));
        self
    }

    /// Short human-readable form used in step names and logs
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(parent) = &self.within {
            parts.push(format!("{} >>", parent.describe()));
        }
        if let Some(css) = &self.css {
            parts.push(css.clone());
        }
        if let Some(role) = &self.role {
            match &self.name {
                Some(name) => parts.push(format!("role={}[name={:?}]", role, name)),
                None => parts.push(format!("role={}", role)),
            }
        }
        if let Some(label) = &self.label {
            parts.push(format!("label={:?}", label));
        }
        if let Some(text) = &self.text {
            parts.push(format!("text={:?}", text));
        }
        if let Some(has) = &self.has {
            parts.push(format!("has({} = {:?})", has.css, has.text));
        }
        match self.nth {
            Some(0) => parts.push("first".to_string()),
            Some(-1) => parts.push("last".to_string()),
            Some(n) => parts.push(format!("nth={}", n)),
            None => {}
        }
        parts.join(" ")
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.css.is_none() && self.role.is_none() && self.label.is_none() && self.text.is_none() {
            return Err(E2eError::SpecParse(
                "target needs at least one of css, role, label or text".to_string(),
            ));
        }
        if self.name.is_some() && self.role.is_none() {
            return Err(E2eError::SpecParse(format!(
                "target {}: name requires role",
                self.describe()
            )));
        }
        if matches!(self.nth, Some(n) if n < -1) {
            return Err(E2eError::SpecParse(format!(
                "target {}: nth must be -1 or greater",
                self.describe()
            )));
        }
        if let Some(parent) = &self.within {
            parent.validate()?;
        }
        Ok(())
    }
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to the server root)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for: Option<Target>,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Click an element
    Click {
        target: Target,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Fill an input field
    Fill {
        target: Target,
        value: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Press a key, on an element or the page
    Press {
        #[serde(default)]
        target: Option<Target>,
        key: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Wait for an element to reach a state
    Wait {
        target: Target,
        #[serde(default)]
        state: WaitState,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Assert something about an element, retrying until the timeout
    Assert {
        target: Target,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(flatten)]
        expect: Expectation,
    },

    /// Take a screenshot of the page
    Screenshot {
        /// Relative to the artifacts directory
        path: PathBuf,
        #[serde(default = "default_full_page")]
        full_page: bool,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

fn default_wait_timeout() -> u64 {
    5000 // 5 seconds default
}

fn default_full_page() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
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

/// Conditions an asserted element must meet. Every field that is set is checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default)]
    pub visible: Option<bool>,

    /// Exact text
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub text_contains: Option<String>,

    /// Text the element must not show, e.g. a stale placeholder
    #[serde(default)]
    pub not_text: Option<String>,

    /// Exact value of the class attribute
    #[serde(default)]
    pub class: Option<String>,

    /// One class among possibly several
    #[serde(default)]
    pub has_class: Option<String>,

    #[serde(default)]
    pub count: Option<usize>,

    /// Ratio the element must render as `N.NNx`
    #[serde(default)]
    pub multiplier: Option<f64>,

    /// Price and thresholds whose gradient class the element must carry
    #[serde(default)]
    pub bucket: Option<PriceFixture>,

    /// Price and thresholds whose risk level the element must show
    #[serde(default)]
    pub risk_level: Option<PriceFixture>,
}

/// A price with the thresholds configured for its asset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceFixture {
    pub value: f64,
    pub low: f64,
    pub high: f64,
}

impl PriceFixture {
    pub fn thresholds(&self) -> E2eResult<Thresholds> {
        Thresholds::new(self.low, self.high).ok_or_else(|| {
            E2eError::SpecParse(format!(
                "invalid thresholds low={} high={}: high must exceed low",
                self.low, self.high
            ))
        })
    }
}

/// A single check derived from an [`Expectation`]
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Visible(bool),
    Text(String),
    TextContains(String),
    NotText(String),
    Class(String),
    HasClass(String),
    /// No `gradient-N` class at all
    NoGradient,
    Count(usize),
}

impl Expectation {
    pub fn is_empty(&self) -> bool {
        *self == Expectation::default()
    }

    /// Resolve fixtures into the concrete checks the browser performs
    pub fn checks(&self) -> E2eResult<Vec<Check>> {
        let mut checks = Vec::new();

        if let Some(visible) = self.visible {
            checks.push(Check::Visible(visible));
        }
        if let Some(text) = &self.text {
            checks.push(Check::Text(text.clone()));
        }
        if let Some(text) = &self.text_contains {
            checks.push(Check::TextContains(text.clone()));
        }
        if let Some(text) = &self.not_text {
            checks.push(Check::NotText(text.clone()));
        }
        if let Some(class) = &self.class {
            checks.push(Check::Class(class.clone()));
        }
        if let Some(class) = &self.has_class {
            checks.push(Check::HasClass(class.clone()));
        }
        if let Some(count) = self.count {
            checks.push(Check::Count(count));
        }
        if let Some(ratio) = self.multiplier {
            checks.push(Check::Text(format_multiplier(ratio)));
        }
        if let Some(fixture) = &self.bucket {
            let thresholds = fixture.thresholds()?;
            match gradient_bucket(fixture.value, &thresholds) {
                Some(bucket) => checks.push(Check::HasClass(bucket.class_name())),
                None => checks.push(Check::NoGradient),
            }
        }
        if let Some(fixture) = &self.risk_level {
            let thresholds = fixture.thresholds()?;
            let level = risk_level(fixture.value, &thresholds);
            checks.push(Check::Text(format_risk_level(level)));
        }

        Ok(checks)
    }
}

impl TestStep {
    /// Short name used in results and logs
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url, .. } => format!("navigate:{}", url),
            TestStep::Click { target, .. } => format!("click:{}", target.describe()),
            TestStep::Fill { target, .. } => format!("fill:{}", target.describe()),
            TestStep::Press { target: Some(target), key, .. } => {
                format!("press:{}:{}", target.describe(), key)
            }
            TestStep::Press { target: None, key, .. } => format!("press:{}", key),
            TestStep::Wait { target, .. } => format!("wait:{}", target.describe()),
            TestStep::Assert { target, .. } => format!("assert:{}", target.describe()),
            TestStep::Screenshot { path, .. } => format!("screenshot:{}", path.display()),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    /// Longest time this step may wait on the page
    pub fn timeout_ms(&self) -> u64 {
        match self {
            TestStep::Navigate { timeout_ms, .. }
            | TestStep::Click { timeout_ms, .. }
            | TestStep::Fill { timeout_ms, .. }
            | TestStep::Press { timeout_ms, .. }
            | TestStep::Wait { timeout_ms, .. }
            | TestStep::Assert { timeout_ms, .. } => *timeout_ms,
            TestStep::Screenshot { .. } => default_wait_timeout(),
            TestStep::Log { .. } => 0,
        }
    }

    /// Whether the step changes page state
    pub fn is_interaction(&self) -> bool {
        matches!(
            self,
            TestStep::Click { .. } | TestStep::Fill { .. } | TestStep::Press { .. }
        )
    }

    pub fn validate(&self) -> E2eResult<()> {
        match self {
            TestStep::Navigate { wait_for, .. } => {
                if let Some(target) = wait_for {
                    target.validate()?;
                }
            }
            TestStep::Click { target, .. }
            | TestStep::Fill { target, .. }
            | TestStep::Wait { target, .. } => target.validate()?,
            TestStep::Press { target, .. } => {
                if let Some(target) = target {
                    target.validate()?;
                }
            }
            TestStep::Assert { target, expect, .. } => {
                target.validate()?;
                if expect.is_empty() {
                    return Err(E2eError::SpecParse(format!(
                        "{}: assert has no expectations",
                        self.name()
                    )));
                }
                expect.checks()?;
            }
            TestStep::Screenshot { path, .. } => {
                if path.as_os_str().is_empty() || path.is_absolute() {
                    return Err(E2eError::SpecParse(format!(
                        "screenshot path must be relative: {:?}",
                        path
                    )));
                }
            }
            TestStep::Log { .. } => {}
        }
        Ok(())
    }
}

impl TestSpec {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::SpecParse(format!(
                "scenario directory not found: {}",
                dir.display()
            )));
        }

        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("{}: no steps", self.name)));
        }
        for step in &self.steps {
            step.validate()
                .map_err(|e| E2eError::SpecParse(format!("{}: {}", self.name, e)))?;
        }
        Ok(())
    }

    /// Screenshot paths this scenario writes, in step order
    pub fn screenshot_paths(&self) -> Vec<&Path> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                TestStep::Screenshot { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS_SCENARIO: &str = r#"
name: dashboard-thresholds
description: Multiplier formatting and threshold colouring
tags:
  - dashboard
  - settings
steps:
  - action: navigate
    url: /
    wait_for:
      css: .data-table
    timeout_ms: 10000
  - action: assert
    target:
      css: td
      nth: -1
      within:
        css: ".data-table tbody tr:nth-child(2)"
    multiplier: 2.22
  - action: fill
    target:
      label: "Low Price Threshold (Red):"
    value: "0.0005"
  - action: press
    target:
      label: "High Price Threshold (Green):"
    key: Enter
  - action: assert
    target:
      role: cell
      name: "0.001"
    bucket:
      value: 0.001
      low: 0.0005
      high: 1.0
  - action: screenshot
    path: dashboard_final.png
"#;

    #[test]
    fn test_parse_scenario() {
        let spec = TestSpec::from_yaml(THRESHOLDS_SCENARIO).unwrap();
        assert_eq!(spec.name, "dashboard-thresholds");
        assert_eq!(spec.steps.len(), 6);
        assert!(spec.viewport.is_none());
        assert_eq!(spec.screenshot_paths(), vec![Path::new("dashboard_final.png")]);

        match &spec.steps[1] {
            TestStep::Assert { target, timeout_ms, expect } => {
                assert_eq!(*timeout_ms, 5000);
                assert_eq!(target.nth, Some(-1));
                assert_eq!(
                    target.within.as_deref(),
                    Some(&Target::css(".data-table tbody tr:nth-child(2)"))
                );
                assert_eq!(expect.checks().unwrap(), vec![Check::Text("2.22x".to_string())]);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_bucket_fixture_resolves_to_class() {
        let spec = TestSpec::from_yaml(THRESHOLDS_SCENARIO).unwrap();
        let TestStep::Assert { expect, .. } = &spec.steps[4] else {
            panic!("expected assert step");
        };
        assert_eq!(
            expect.checks().unwrap(),
            vec![Check::HasClass("gradient-2".to_string())]
        );
    }

    #[test]
    fn test_nan_price_expects_no_gradient() {
        let expect = Expectation {
            bucket: Some(PriceFixture { value: f64::NAN, low: 0.1, high: 1.0 }),
            ..Default::default()
        };
        assert_eq!(expect.checks().unwrap(), vec![Check::NoGradient]);
    }

    #[test]
    fn test_risk_level_fixture() {
        let expect = Expectation {
            risk_level: Some(PriceFixture { value: 4.0, low: 0.0, high: 8.0 }),
            ..Default::default()
        };
        assert_eq!(expect.checks().unwrap(), vec![Check::Text("0.500".to_string())]);
    }

    #[test]
    fn test_live_price_expectations() {
        let yaml = r##"
name: live-prices
steps:
  - action: navigate
    url: /
  - action: assert
    target:
      css: .asset-card
      within:
        css: "#asset-grid"
    count: 10
    timeout_ms: 15000
  - action: assert
    target:
      css: .risk-level
      within:
        css: .asset-card
        has:
          css: .asset-name
          text: BTC
    text_contains: "$"
    not_text: "0.675"
    timeout_ms: 10000
"##;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.steps[1].timeout_ms(), 15000);

        let TestStep::Assert { target, expect, .. } = &spec.steps[2] else {
            panic!("expected assert step");
        };
        let parent = target.within.as_deref().unwrap();
        assert_eq!(
            parent.has,
            Some(HasChild { css: ".asset-name".to_string(), text: "BTC".to_string() })
        );
        assert_eq!(
            expect.checks().unwrap(),
            vec![
                Check::TextContains("$".to_string()),
                Check::NotText("0.675".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejects_assert_without_expectations() {
        let yaml = r#"
name: empty-assert
steps:
  - action: assert
    target:
      css: .data-table
"#;
        let err = TestSpec::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("no expectations"), "{}", err);
    }

    #[test]
    fn test_rejects_invalid_thresholds() {
        let yaml = r#"
name: bad-thresholds
steps:
  - action: assert
    target:
      role: cell
      name: "0.001"
    bucket:
      value: 0.001
      low: 1.0
      high: 0.5
"#;
        assert!(TestSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_target_validation() {
        assert!(Target::default().validate().is_err());
        assert!(Target::css("td").nth(-2).validate().is_err());

        let nameless_role = Target {
            name: Some("Settings".to_string()),
            ..Default::default()
        };
        assert!(nameless_role.validate().is_err());

        let nested_bad = Target::css("td").within(Target::default());
        assert!(nested_bad.validate().is_err());

        assert!(Target::role("button", "Settings").validate().is_ok());
    }

    #[test]
    fn test_rejects_absolute_screenshot_path() {
        let step = TestStep::Screenshot {
            path: PathBuf::from("/tmp/shot.png"),
            full_page: true,
        };
        assert!(step.validate().is_err());
    }

    #[test]
    fn test_target_describe() {
        let target = Target::css("td")
            .nth(0)
            .within(Target::css(".data-table tbody tr").nth(0));
        assert_eq!(target.describe(), ".data-table tbody tr first >> td first");
    }

    #[test]
    fn test_load_all_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "name: second\nsteps:\n  - action: log\n    message: hi\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "name: first\ntags: [smoke]\nsteps:\n  - action: log\n    message: hi\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let specs = TestSpec::load_all(dir.path()).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(TestSpec::filter_by_tag(&specs, "smoke").len(), 1);
    }
}
