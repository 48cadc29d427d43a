//! The per-process context handed to every command.
//!
//! `main` builds one [`Context`] up front: the opened document repo, the
//! process streams, and the per-destination write locks. Nothing is
//! initialized lazily behind a global.

use std::io;

use amtool_crdt::Repo;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::writer::WriteLocks;

pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Process streams: stdin as a copy source, stdout as the primary output,
/// stderr as the diagnostic stream.
pub struct Streams {
    stdin: Mutex<Option<BoxReader>>,
    stdout: Mutex<BoxWriter>,
    stderr: Mutex<BoxWriter>,
}

impl Streams {
    pub fn new(stdin: BoxReader, stdout: BoxWriter, stderr: BoxWriter) -> Self {
        Self {
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(stdout),
            stderr: Mutex::new(stderr),
        }
    }

    /// The real process streams.
    pub fn stdio() -> Self {
        Self::new(
            Box::new(tokio::io::stdin()),
            Box::new(tokio::io::stdout()),
            Box::new(tokio::io::stderr()),
        )
    }

    /// Take stdin for reading. Only the first caller gets it.
    pub async fn take_stdin(&self) -> Option<BoxReader> {
        self.stdin.lock().await.take()
    }

    /// Write to stdout and flush.
    pub async fn write_stdout(&self, bytes: &[u8]) -> io::Result<()> {
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(bytes).await?;
        stdout.flush().await
    }

    /// Write one line to the diagnostic stream.
    pub async fn diagnostic(&self, line: &str) -> io::Result<()> {
        let mut stderr = self.stderr.lock().await;
        stderr.write_all(line.as_bytes()).await?;
        stderr.write_all(b"\n").await?;
        stderr.flush().await
    }
}

/// Everything a command needs: the document repo, the process streams, and
/// the locks that keep writes to one destination from overlapping.
pub struct Context {
    pub repo: Repo,
    pub streams: Streams,
    pub write_locks: WriteLocks,
}

impl Context {
    pub fn new(repo: Repo, streams: Streams) -> Self {
        Self {
            repo,
            streams,
            write_locks: WriteLocks::default(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{self, Poll};

    use super::*;

    /// An in-memory writer whose contents tests can inspect.
    #[derive(Clone, Default)]
    pub(crate) struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Capture {
        pub(crate) fn bytes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }

        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.bytes()).unwrap()
        }
    }

    impl AsyncWrite for Capture {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut task::Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut task::Context<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// A context over an in-memory repo, with `stdin` as input.
    pub(crate) struct TestContext {
        pub(crate) ctx: Context,
        pub(crate) stdout: Capture,
        pub(crate) stderr: Capture,
    }

    impl TestContext {
        pub(crate) fn new(stdin: impl AsRef<[u8]>) -> Self {
            let stdout = Capture::default();
            let stderr = Capture::default();
            let streams = Streams::new(
                Box::new(std::io::Cursor::new(stdin.as_ref().to_vec())),
                Box::new(stdout.clone()),
                Box::new(stderr.clone()),
            );
            let repo = Repo::in_memory().unwrap();
            Self {
                ctx: Context::new(repo, streams),
                stdout,
                stderr,
            }
        }
    }
}
