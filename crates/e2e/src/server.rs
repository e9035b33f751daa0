//! Server management - spawning, readiness probing and tearing down the file server

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to a running file server process.
///
/// On unix the server is the leader of its own process group, and stopping
/// signals the whole group, so processes it forked (a shell wrapper, `npx`)
/// go down with it. The group is terminated when the handle is stopped or
/// dropped, so it never outlives the verification run that started it.
pub struct ServerHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
    health_url: String,
    startup_timeout: Duration,
    stop_grace: Duration,
    stopped: bool,
}

/// Poll interval while waiting for the server to exit
const EXIT_POLL: Duration = Duration::from_millis(25);

impl ServerHandle {
    /// Spawn the file server and wait until it answers HTTP requests
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let mut handle = Self::start(&config)?;

        if let Err(e) = handle.wait_until_ready().await {
            handle.shutdown().await?;
            return Err(e);
        }

        info!("Server is ready at {}", handle.base_url);
        Ok(handle)
    }

    /// Spawn the file server process without waiting for it
    pub fn start(config: &ServerConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://{}:{}", url_host(&config.host), port);
        let health_url = format!("{}{}", base_url, config.health_path());

        let (program, args) = config.command_line(port);
        info!("Spawning file server on port {}: {} {}", port, program.display(), args.join(" "));

        let mut cmd = Command::new(&program);
        cmd.args(&args);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        if config.inherit_output {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn {}: {}", program.display(), e))
        })?;

        Ok(ServerHandle {
            child,
            base_url,
            port,
            health_url,
            startup_timeout: Duration::from_millis(config.startup_timeout_ms),
            stop_grace: Duration::from_millis(config.stop_grace_ms),
            stopped: false,
        })
    }

    /// Probe the server until it responds, it exits, or the startup timeout elapses
    pub async fn wait_until_ready(&mut self) -> E2eResult<usize> {
        let probe = ReadinessProbe::new(&self.health_url, self.startup_timeout);
        let child = &mut self.child;

        probe
            .wait(|| match child.try_wait()? {
                Some(status) => Err(E2eError::ServerStartup(format!(
                    "server exited before becoming ready ({})",
                    status
                ))),
                None => Ok(()),
            })
            .await
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// OS process id of the server
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Whether the server process has terminated
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Stop the server, blocking the current thread for up to the grace
    /// period. Safe to call more than once.
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(grace) = self.begin_stop() else {
            return Ok(());
        };

        let deadline = Instant::now() + grace;
        while self.child.try_wait()?.is_none() && Instant::now() < deadline {
            std::thread::sleep(EXIT_POLL);
        }

        self.finish_stop()
    }

    /// Async counterpart of [`ServerHandle::stop`] that yields while waiting
    pub async fn shutdown(&mut self) -> E2eResult<()> {
        let Some(grace) = self.begin_stop() else {
            return Ok(());
        };

        let deadline = Instant::now() + grace;
        while self.child.try_wait()?.is_none() && Instant::now() < deadline {
            sleep(EXIT_POLL).await;
        }

        self.finish_stop()
    }

    /// Ask the server group to terminate. Returns how long to wait for a
    /// graceful exit, `None` if already stopped.
    fn begin_stop(&mut self) -> Option<Duration> {
        if self.stopped {
            return None;
        }
        self.stopped = true;

        info!("Stopping server (pid: {})", self.child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;

            if self.signal_group(Signal::SIGTERM) {
                return Some(self.stop_grace);
            }
        }

        Some(Duration::ZERO)
    }

    /// Kill whatever is left of the group and reap the server
    fn finish_stop(&mut self) -> E2eResult<()> {
        match self.child.try_wait()? {
            Some(status) => debug!("Server exited ({})", status),
            None => warn!("Server ignored SIGTERM for {:?}, killing", self.stop_grace),
        }

        // Forked children may outlive the leader
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;
            self.signal_group(Signal::SIGKILL);
        }

        match self.child.kill() {
            Ok(()) => {}
            // Already exited between the checks
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e.into()),
        }
        self.child.wait()?;

        Ok(())
    }

    /// Send `signal` to the server's process group. False if no member is left.
    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) -> bool {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(self.child.id() as i32), signal) {
            Ok(()) => true,
            Err(nix::errno::Errno::ESRCH) => false,
            Err(e) => {
                warn!("Failed to send {:?} to server group: {}", signal, e);
                false
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop server: {}", e);
        }
    }
}

/// Active readiness check: retry a request with exponential backoff
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    pub url: String,
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ReadinessProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }

    /// Poll until a 2xx response arrives. Returns the number of attempts.
    ///
    /// `still_running` is checked before every attempt and aborts the wait
    /// with its error, e.g. when the server process has already exited.
    pub async fn wait<F>(&self, mut still_running: F) -> E2eResult<usize>
    where
        F: FnMut() -> E2eResult<()>,
    {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;
        let mut backoff = self.initial_backoff;

        loop {
            still_running()?;
            attempts += 1;

            match client.get(&self.url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("{} ready after {} attempt(s)", self.url, attempts);
                    return Ok(attempts);
                }
                Ok(resp) => {
                    warn!("Readiness check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for server to start...");
                    }
                    // Connection refused is expected while server is starting
                    if !e.is_connect() {
                        warn!("Readiness check error: {}", e);
                    }
                }
            }

            let remaining = self.timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(E2eError::ServerHealthCheck(attempts));
            }

            sleep(backoff.min(remaining)).await;
            backoff = (backoff * 2).min(self.max_backoff);
        }
    }
}

/// How the file server process is launched
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerLaunch {
    /// The bundled `dashcheck-serve` binary
    Builtin {
        #[serde(default = "default_serve_binary")]
        binary: PathBuf,
    },

    /// Any file server; `{port}`, `{host}` and `{root}` in args are substituted
    Command {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for ServerLaunch {
    fn default() -> Self {
        ServerLaunch::Builtin {
            binary: default_serve_binary(),
        }
    }
}

/// Configuration for spawning a server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// How to start the server process
    pub launch: ServerLaunch,

    /// Directory containing the dashboard's static files
    pub root_dir: PathBuf,

    /// Interface the server listens on
    pub host: String,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Path probed for readiness (defaults per launch kind)
    pub health_path: Option<String>,

    /// Timeout for server startup
    pub startup_timeout_ms: u64,

    /// How long SIGTERM is given before the process is killed
    pub stop_grace_ms: u64,

    /// Pass server stdout/stderr through instead of discarding them
    pub inherit_output: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            launch: ServerLaunch::default(),
            root_dir: PathBuf::from("."),
            host: "127.0.0.1".to_string(),
            port: None,
            health_path: None,
            startup_timeout_ms: 10_000,
            stop_grace_ms: 500,
            inherit_output: false,
        }
    }
}

impl ServerConfig {
    /// Path used by the readiness probe
    pub fn health_path(&self) -> String {
        let path = match (&self.health_path, &self.launch) {
            (Some(path), _) => path.clone(),
            (None, ServerLaunch::Builtin { .. }) => "/health".to_string(),
            (None, ServerLaunch::Command { .. }) => "/".to_string(),
        };
        if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        }
    }

    /// Program and arguments for a server listening on `port`
    pub fn command_line(&self, port: u16) -> (PathBuf, Vec<String>) {
        let root = self.root_dir.to_string_lossy().to_string();
        match &self.launch {
            ServerLaunch::Builtin { binary } => (
                binary.clone(),
                vec![
                    "--root".to_string(),
                    root,
                    "--host".to_string(),
                    self.host.trim_start_matches('[').trim_end_matches(']').to_string(),
                    "--port".to_string(),
                    port.to_string(),
                ],
            ),
            ServerLaunch::Command { program, args } => {
                (program.clone(), render_args(args, &self.host, port, &root))
            }
        }
    }
}

/// Substitute `{port}`, `{host}` and `{root}` placeholders
pub fn render_args(args: &[String], host: &str, port: u16, root: &str) -> Vec<String> {
    let port = port.to_string();
    args.iter()
        .map(|arg| {
            arg.replace("{port}", &port)
                .replace("{host}", host)
                .replace("{root}", root)
        })
        .collect()
}

/// Host as it appears in a URL; IPv6 literals are bracketed
pub fn url_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

/// `dashcheck-serve` next to the running executable, else on `PATH`
pub fn default_serve_binary() -> PathBuf {
    let name = format!("dashcheck-serve{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| {
            let dir = exe.parent()?;
            // Test binaries live one level down in target/<profile>/deps
            [dir.join(&name), dir.parent()?.join(&name)]
                .into_iter()
                .find(|candidate| candidate.is_file())
        })
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Find a free port to use
pub fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
