//! Dashcheck verification harness
//!
//! Drives a statically served price dashboard through a real browser and
//! checks what a user would see:
//! - Spawns the file server as a subprocess and waits for it to answer
//! - Generates one Playwright script per scenario and follows its progress
//! - Parses declarative YAML scenarios
//! - Confirms screenshots landed on disk
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Verification Runner (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_server() -> ServerHandle                       │
//! │    ├── PlaywrightHandle::run_spec(spec) -> ScriptOutcome    │
//! │    ├── run_spec(spec) -> TestResult { phase, artifacts }    │
//! │    └── stop_server()  (always, also on drop)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML)                                            │
//! │    ├── name, description, tags, viewport?                   │
//! │    └── steps: [Step]                                        │
//! │          ├── navigate { url, wait_for? }                    │
//! │          ├── click / fill / press { target }                │
//! │          ├── wait { target, state }                         │
//! │          ├── assert { target, text?, class?, bucket?, ... } │
//! │          ├── screenshot { path, full_page }                 │
//! │          └── log { message }                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod playwright;
pub mod runner;
pub mod server;
pub mod spec;

pub use error::{E2eError, E2eResult};
pub use runner::{RunPhase, RunnerConfig, TestRunner};
pub use spec::{TestSpec, TestStep};
