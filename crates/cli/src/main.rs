mod check;
mod cli;
mod engine;
mod evidence;
mod output;
mod rules;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cli::{CliArgs, Command};
use crate::output::Output;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so `--json` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    guard_core::config::load_dotenv();
    let args = CliArgs::parse();
    let config = engine::resolve_config(&args);
    config.log_summary();

    let out = Output::new(args.json);
    match args.command {
        Command::Check(check_args) => check::run(check_args, &config, &out).await,
        Command::Rules(cmd) => rules::run(cmd, &config, &out).await,
        Command::Evidence(cmd) => evidence::run(cmd, &config, &out).await,
    }
}
