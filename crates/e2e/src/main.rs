//! Dashcheck - Main Entry Point
//!
//! Runs YAML scenarios against a dashboard served from a local directory.
//! Exit codes: 0 all scenarios passed, 1 a scenario failed, 2 the harness
//! itself could not run.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dashcheck_e2e::playwright::Browser;
use dashcheck_e2e::server::ServerLaunch;
use dashcheck_e2e::{E2eError, E2eResult, RunnerConfig, TestRunner, TestSpec};

/// Browser verification for statically served dashboards
#[derive(Parser)]
#[command(name = "dashcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard and run scenarios against it
    Run(RunArgs),

    /// Parse and validate scenarios without launching anything
    Validate {
        /// Scenario directory
        #[arg(short, long, env = "DASHCHECK_SCENARIOS", default_value = "scenarios")]
        scenarios: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// TOML configuration file; flags override its values
    #[arg(short, long, env = "DASHCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Scenario directory
    #[arg(short, long, env = "DASHCHECK_SCENARIOS")]
    scenarios: Option<PathBuf>,

    /// Dashboard directory to serve
    #[arg(short, long, env = "DASHCHECK_ROOT")]
    root: Option<PathBuf>,

    /// Run only scenarios with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the scenario with this name
    #[arg(short, long, conflicts_with = "tag")]
    name: Option<String>,

    /// Address the server binds and the browser connects to
    #[arg(long, env = "DASHCHECK_HOST")]
    host: Option<String>,

    /// Port to serve on (default: any free port)
    #[arg(long, env = "DASHCHECK_PORT")]
    port: Option<u16>,

    /// Path to the dashcheck-serve binary
    #[arg(long, env = "DASHCHECK_SERVER_BINARY", conflicts_with = "server_cmd")]
    server_binary: Option<PathBuf>,

    /// Command that serves the dashboard instead of dashcheck-serve;
    /// `{port}`, `{host}` and `{root}` are substituted in its arguments.
    /// Must come last.
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    server_cmd: Option<Vec<String>>,

    /// Browser to use
    #[arg(long, value_enum)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Default viewport width for scenarios without their own
    #[arg(long)]
    viewport_width: Option<u32>,

    /// Default viewport height for scenarios without their own
    #[arg(long)]
    viewport_height: Option<u32>,

    /// Node binary that runs the generated scripts
    #[arg(long, env = "DASHCHECK_NODE")]
    node: Option<PathBuf>,

    /// node_modules directory containing @playwright/test
    #[arg(long, env = "DASHCHECK_NODE_MODULES")]
    node_modules: Option<PathBuf>,

    /// Directory that relative screenshot paths resolve against
    #[arg(long, env = "DASHCHECK_ARTIFACTS")]
    artifacts: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the check for @playwright/test
    #[arg(long)]
    skip_install_check: bool,
}

impl RunArgs {
    fn into_config(self) -> E2eResult<(RunnerConfig, Selection)> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::from_toml_file(path)?,
            None => RunnerConfig::default(),
        };

        if let Some(scenarios) = self.scenarios {
            config.scenarios_dir = scenarios;
        }
        if let Some(root) = self.root {
            config.server.root_dir = root;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = Some(port);
        }
        if let Some(binary) = self.server_binary {
            config.server.launch = ServerLaunch::Builtin { binary };
        }
        if let Some(mut cmd) = self.server_cmd {
            if cmd.is_empty() {
                return Err(E2eError::Config("--server-cmd needs a program".to_string()));
            }
            let program = PathBuf::from(cmd.remove(0));
            config.server.launch = ServerLaunch::Command { program, args: cmd };
        }
        if let Some(browser) = self.browser {
            config.playwright.browser = browser;
        }
        if self.headed {
            config.playwright.headless = false;
        }
        if let Some(width) = self.viewport_width {
            config.playwright.viewport_width = width;
        }
        if let Some(height) = self.viewport_height {
            config.playwright.viewport_height = height;
        }
        if let Some(node) = self.node {
            config.playwright.node_binary = node;
        }
        if let Some(node_modules) = self.node_modules {
            config.playwright.node_modules = Some(node_modules);
        }
        if let Some(artifacts) = self.artifacts {
            config.playwright.artifacts_dir = artifacts;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if self.skip_install_check {
            config.check_install = false;
        }

        let selection = match (self.tag, self.name) {
            (Some(tag), _) => Selection::Tag(tag),
            (None, Some(name)) => Selection::Name(name),
            (None, None) => Selection::All,
        };

        Ok((config, selection))
    }
}

enum Selection {
    All,
    Tag(String),
    Name(String),
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the final summary
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match tokio::runtime::Runtime::new() {
        Ok(rt) => match rt.block_on(async_main(cli.command)) {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                error!("{}", e);
                2
            }
        },
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            2
        }
    };

    std::process::exit(code);
}

async fn async_main(command: Commands) -> E2eResult<bool> {
    match command {
        Commands::Validate { scenarios } => {
            let specs = TestSpec::load_all(&scenarios)?;
            for spec in &specs {
                println!("ok  {} ({} steps)", spec.name, spec.steps.len());
            }
            info!("{} scenario(s) valid", specs.len());
            Ok(true)
        }
        Commands::Run(args) => {
            let (config, selection) = args.into_config()?;
            let mut runner = TestRunner::with_config(config);

            let results = match selection {
                Selection::All => runner.run_all().await?,
                Selection::Tag(tag) => runner.run_tagged(&tag).await?,
                Selection::Name(name) => runner.run_test(&name).await?,
            };

            runner.write_results(&results)?;

            println!();
            println!("═══════════════════════════════════════════════════════════");
            println!("                    DASHCHECK RESULTS");
            println!("═══════════════════════════════════════════════════════════");
            println!();

            for result in &results.results {
                let status = if result.success { "✓" } else { "✗" };
                println!("  {} {} ({} ms)", status, result.name, result.duration_ms);
                if let Some(err) = &result.error {
                    println!("      └─ {}", err);
                }
                for artifact in &result.artifacts {
                    println!("      └─ {} ({} bytes)", artifact.path.display(), artifact.bytes);
                }
            }

            println!();
            println!("───────────────────────────────────────────────────────────");
            println!(
                "  Total: {}  Passed: {}  Failed: {}  Duration: {} ms",
                results.total, results.passed, results.failed, results.duration_ms
            );
            println!("═══════════════════════════════════════════════════════════");

            Ok(results.all_passed())
        }
    }
}
