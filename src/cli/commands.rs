use crate::config::GatewayConfig;
use crate::runtime_config::RuntimeConfig;
use crate::server::{GatewayService, HttpServer, ServerHandle};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Command-line interface for tokengate
#[derive(Parser)]
#[command(name = "tokengate", version)]
#[command(about = "Bearer-token validation gateway", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Serve POST /validate
    Serve {
        /// Path to the YAML configuration file
        #[arg(short, long, env = "TOKENGATE_CONFIG")]
        config: PathBuf,

        /// Address to listen on
        #[arg(long, env = "TOKENGATE_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,
    },
    /// Load and validate a configuration file
    Check {
        /// Path to the YAML configuration file
        #[arg(short, long, env = "TOKENGATE_CONFIG")]
        config: PathBuf,
    },
}

/// Execute a parsed command line
///
/// # Errors
///
/// Configuration that fails to load or validate, or a server that cannot bind.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { config, addr } => serve(&config, &addr),
        Commands::Check { config } => {
            let loaded = load_config(&config)?;
            loaded
                .validate()
                .with_context(|| format!("invalid configuration in {}", config.display()))?;
            println!("{}", loaded.summary());
            println!("configuration OK");
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    GatewayConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn serve(config_path: &Path, addr: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let gateway = config
        .build_gateway()
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

    let runtime = RuntimeConfig::from_env();
    may::config().set_stack_size(runtime.stack_size);

    let strategy = gateway.strategy().name();
    let service = GatewayService::new(Arc::new(gateway));
    let handle = HttpServer(service)
        .start(addr)
        .with_context(|| format!("failed to bind {addr}"))?;
    handle.wait_ready().context("server did not become ready")?;
    info!(
        addr = %handle.addr(),
        strategy,
        stack_size = runtime.stack_size,
        "tokengate listening"
    );

    wait_for_shutdown(handle)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "shutting down");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server coroutine panicked: {e:?}"))
}
