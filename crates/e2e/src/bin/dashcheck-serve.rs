use std::path::PathBuf;

use clap::Parser;
use tracing::info;

/// Serve a dashboard directory over HTTP
#[derive(Parser)]
#[command(name = "dashcheck-serve")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory to serve
    #[arg(long, env = "DASHCHECK_SERVE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Address to bind
    #[arg(long, env = "DASHCHECK_SERVE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, env = "DASHCHECK_SERVE_PORT", default_value = "8000")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    // Brackets are URL syntax, not part of the address
    let host = args.host.trim_start_matches('[').trim_end_matches(']');

    info!("Serving {} on {}:{}", args.root.display(), host, args.port);

    dashcheck_web::serve((host, args.port), args.root, dashcheck_web::shutdown_signal()).await
}
