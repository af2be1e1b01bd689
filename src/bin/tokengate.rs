use clap::Parser;
use tokengate::cli::{run_cli, Cli};
use tokengate::otel::{init_logging_with_config, LogConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging_with_config(&LogConfig::from_env())?;
    run_cli(cli)
}
