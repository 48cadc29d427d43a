//! The error boundary around copy work.
//!
//! A [`DomainError`] is reported on the diagnostic stream as `error: <message>`.
//! What happens next depends on the [`Boundary`]: a fatal boundary turns the
//! error into a [`Halt`], a recovering one lets the caller carry on. Any other
//! error passes through unreported.

use std::future::Future;

use crate::context::Streams;
use crate::error::{DomainError, Halt};

/// What a boundary does after reporting a domain error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Report, then halt the process with status 1.
    Fatal,
    /// Report, then continue. Used around each event of a watch.
    Recover,
}

/// Run `work`, reporting any domain error it fails with.
pub async fn run_guarded<F>(streams: &Streams, boundary: Boundary, work: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let err = match work.await {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    let Some(domain) = err.downcast_ref::<DomainError>() else {
        return Err(err);
    };

    streams.diagnostic(&format!("error: {domain}")).await?;
    match boundary {
        Boundary::Fatal => Err(Halt::failure().into()),
        Boundary::Recover => {
            tracing::debug!(error = %domain, "continuing after error");
            Ok(())
        }
    }
}
