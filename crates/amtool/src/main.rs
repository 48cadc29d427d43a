//! The `amt` binary.

use std::process::ExitCode;

use amtool::cli::Cli;
use amtool::config::Config;
use amtool::{Context, Halt, Streams, commands};
use amtool_crdt::Repo;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries copied values.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // A watch on stdin may still be blocked in a read.
    runtime.shutdown_background();

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => match err.downcast_ref::<Halt>() {
            Some(halt) => Ok(ExitCode::from(halt.code)),
            None => Err(err),
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        sync_url,
        storage,
        command,
    } = cli;
    let config = Config::resolve(storage, sync_url)?;
    let repo = Repo::open(config.repo_config())?;
    let ctx = Context::new(repo, Streams::stdio());

    if !command.is_watch() {
        return commands::run(&ctx, command).await;
    }
    tokio::select! {
        result = commands::run(&ctx, command) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::debug!("interrupted, stopping watch");
            Ok(())
        }
    }
}
