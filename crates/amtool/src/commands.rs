//! Top-level commands, each behind a fatal error boundary.

use crate::cli::Command;
use crate::context::Context;
use crate::copy::{self, CopyOp};
use crate::guard::{Boundary, run_guarded};

pub async fn run(ctx: &Context, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Cp {
            src,
            dst,
            watch,
            raw,
        } => {
            let op = CopyOp {
                source: src,
                destination: dst,
                watch,
                raw,
            };
            run_guarded(&ctx.streams, Boundary::Fatal, copy::dispatch(ctx, &op)).await
        }
        Command::Mk => run_guarded(&ctx.streams, Boundary::Fatal, mk(ctx)).await,
        Command::Rm { doc } => run_guarded(&ctx.streams, Boundary::Fatal, rm(ctx, &doc)).await,
    }
}

/// Create a document and print its URL on stdout.
async fn mk(ctx: &Context) -> anyhow::Result<()> {
    let handle = ctx.repo.create()?;
    ctx.streams
        .write_stdout(format!("{}\n", handle.url()).as_bytes())
        .await?;
    Ok(())
}

/// Delete a document. Deleting one that does not exist still succeeds.
async fn rm(ctx: &Context, doc: &str) -> anyhow::Result<()> {
    ctx.repo.delete(doc)?;
    ctx.streams.diagnostic(&format!("deleted {doc}")).await?;
    Ok(())
}
