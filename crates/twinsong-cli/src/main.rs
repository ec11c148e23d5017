//! Twinsong - multi-run notebook execution service.
//!
//! One binary, two roles: by default it starts the notebook server in the
//! current working directory; with the internal `--kernel` flag (used when
//! the server spawns itself as a subprocess) it runs the kernel loop over
//! stdin/stdout instead.

use std::path::PathBuf;

use clap::Parser;
use twinsong_server::ServerConfig;

#[derive(Parser)]
#[command(name = "twinsong")]
#[command(about = "Multi-run notebook execution service")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value = "4511")]
    port: u16,

    /// Run as a kernel subprocess (internal)
    #[arg(long, hide = true)]
    kernel: bool,

    /// Resume kernel state from a fork handoff blob (internal)
    #[arg(long, hide = true, value_name = "PATH")]
    resume: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let kernel_mode = cli.kernel || cli.resume.is_some();

    // Kernel stdout carries IPC frames, so kernel logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if kernel_mode {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        twinsong_kernel::run_kernel(cli.resume.as_deref())?;
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ServerConfig {
        port: cli.port,
        ..ServerConfig::default()
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(twinsong_server::serve(config))?;
    Ok(())
}
