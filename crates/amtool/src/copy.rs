//! The copy dispatcher: pick a strategy from the source kind, copy once or
//! keep copying while the source changes.
//!
//! Each copy reads the source value, hands it to the [`Writer`], and reports
//! `wrote <src> to <dst>` on the diagnostic stream unless the destination is
//! stdout. In watch mode every copy runs behind a recovering error boundary,
//! so a bad value is reported and the watch carries on.

use std::fmt::Display;
use std::path::Path;

use amtool_crdt::{DocumentUpdate, Value};
use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::context::Context;
use crate::error::DomainError;
use crate::file_watch::FileWatch;
use crate::guard::{Boundary, run_guarded};
use crate::location::Location;
use crate::path;
use crate::writer::Writer;

/// One `cp` invocation.
#[derive(Clone, Debug)]
pub struct CopyOp {
    pub source: Location,
    pub destination: Location,
    pub watch: bool,
    pub raw: bool,
}

/// Run a copy. Returns when the copy is done, or for a watch, when the source
/// can no longer change.
pub async fn dispatch(ctx: &Context, op: &CopyOp) -> anyhow::Result<()> {
    tracing::debug!(
        source = %op.source,
        destination = %op.destination,
        watch = op.watch,
        raw = op.raw,
        "copy"
    );
    let copier = Copier {
        ctx,
        op,
        writer: Writer::new(ctx),
    };
    match &op.source {
        Location::Document { url, path } => copier.from_document(url, path).await,
        Location::File { path } => copier.from_file(path).await,
        Location::Stream => copier.from_stream().await,
    }
}

struct Copier<'c> {
    ctx: &'c Context,
    op: &'c CopyOp,
    writer: Writer<'c>,
}

impl Copier<'_> {
    async fn from_document(&self, url: &str, path: &[String]) -> anyhow::Result<()> {
        if self.op.raw && matches!(self.op.destination, Location::Document { .. }) {
            return Err(DomainError::raw_document_to_document().into());
        }
        let handle = self.ctx.repo.find(url)?;

        if !self.op.watch {
            let root = handle
                .snapshot()?
                .ok_or_else(|| DomainError::document_not_found(url))?;
            return self.on_document(&root, path).await;
        }

        let mut changes = handle.subscribe()?;
        loop {
            let update = changes.next().await?;
            run_guarded(&self.ctx.streams, Boundary::Recover, async {
                match &update {
                    DocumentUpdate::Changed(root) => self.on_document(root, path).await,
                    DocumentUpdate::Missing => Err(DomainError::document_not_found(url).into()),
                }
            })
            .await?;
        }
    }

    async fn on_document(&self, root: &Value, path: &[String]) -> anyhow::Result<()> {
        // An absent value is written as null, which raw mode rejects.
        let value = path::get(root, path)?.cloned().unwrap_or(Value::Null);
        self.writer.write(&self.op.destination, &value, self.op.raw).await?;
        self.progress(&self.op.source).await
    }

    async fn from_file(&self, path: &Path) -> anyhow::Result<()> {
        if !self.op.watch {
            return self.on_file(path).await;
        }

        let mut watch = FileWatch::new(path)?;
        if tokio::fs::try_exists(path).await? {
            run_guarded(&self.ctx.streams, Boundary::Recover, self.on_file(path)).await?;
        }
        while watch.changed().await.is_some() {
            run_guarded(&self.ctx.streams, Boundary::Recover, self.on_file(path)).await?;
        }
        Ok(())
    }

    async fn on_file(&self, path: &Path) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let value = self.parse(&bytes)?;
        self.writer.write(&self.op.destination, &value, self.op.raw).await?;
        self.progress(&self.op.source).await
    }

    async fn from_stream(&self) -> anyhow::Result<()> {
        let mut stdin = self
            .ctx
            .streams
            .take_stdin()
            .await
            .context("stdin was already consumed")?;

        if !self.op.watch {
            let mut bytes = Vec::new();
            stdin.read_to_end(&mut bytes).await?;
            let value = self.parse(&bytes)?;
            self.writer.write(&self.op.destination, &value, self.op.raw).await?;
            return self.progress("stdin").await;
        }

        let mut lines = BufReader::new(stdin).split(b'\n');
        while let Some(mut line) = lines.next_segment().await? {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            run_guarded(&self.ctx.streams, Boundary::Recover, async {
                let value = self.parse(&line)?;
                self.writer.write(&self.op.destination, &value, self.op.raw).await?;
                self.progress("line of stdin").await
            })
            .await?;
        }
        tracing::debug!("stdin closed, watch finished");
        Ok(())
    }

    /// Source bytes as a value: text in raw mode, JSON otherwise. Invalid
    /// UTF-8 is replaced rather than rejected.
    fn parse(&self, bytes: &[u8]) -> anyhow::Result<Value> {
        let text = String::from_utf8_lossy(bytes);
        if self.op.raw {
            return Ok(Value::from(text.into_owned()));
        }
        let json: serde_json::Value = serde_json::from_str(&text).context("parsing JSON input")?;
        Ok(json.into())
    }

    async fn progress(&self, what: impl Display) -> anyhow::Result<()> {
        if self.op.destination.is_stream() {
            return Ok(());
        }
        self.ctx
            .streams
            .diagnostic(&format!("wrote {what} to {}", self.op.destination))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::context::testing::TestContext;
    use serde_json::json;

    fn op(source: &str, destination: &str, watch: bool, raw: bool) -> CopyOp {
        CopyOp {
            source: Location::parse(source),
            destination: Location::parse(destination),
            watch,
            raw,
        }
    }

    fn read(path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }

    /// Poll `check` for up to five seconds.
    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not met in time");
    }

    fn document_with(t: &TestContext, content: serde_json::Value) -> String {
        let handle = t.ctx.repo.create().unwrap();
        let Value::Map(entries) = Value::from(content) else {
            panic!("content must be an object");
        };
        handle.change(|doc| doc.merge_into_root(&entries)).unwrap();
        handle.url()
    }

    fn out_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        (dir, path)
    }

    #[tokio::test]
    async fn document_field_to_file() {
        let t = TestContext::new("");
        let url = document_with(&t, json!({"content": "hello"}));
        let (_dir, out) = out_file();
        let dst = out.display().to_string();

        dispatch(&t.ctx, &op(&format!("{url}/content"), &dst, false, false))
            .await
            .unwrap();
        assert_eq!(read(&out).unwrap(), "\"hello\"\n");
        assert_eq!(t.stderr.contents(), format!("wrote {url}/content to {dst}\n"));

        dispatch(&t.ctx, &op(&format!("{url}/content"), &dst, false, true))
            .await
            .unwrap();
        assert_eq!(read(&out).unwrap(), "hello");
    }

    #[tokio::test]
    async fn whole_document_to_stdout_has_no_progress_line() {
        let t = TestContext::new("");
        let url = document_with(&t, json!({"a": [1, 2]}));

        dispatch(&t.ctx, &op(&url, "-", false, false)).await.unwrap();
        assert_eq!(t.stdout.contents(), "{\"a\":[1,2]}\n");
        assert_eq!(t.stderr.contents(), "");
    }

    #[tokio::test]
    async fn absent_source_value_is_null() {
        let t = TestContext::new("");
        let url = document_with(&t, json!({}));

        dispatch(&t.ctx, &op(&format!("{url}/nope"), "-", false, false))
            .await
            .unwrap();
        assert_eq!(t.stdout.contents(), "null\n");

        let err = dispatch(&t.ctx, &op(&format!("{url}/nope"), "-", false, true))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<DomainError>(), Some(&DomainError::raw_value_not_text()));
    }

    #[tokio::test]
    async fn stdin_merges_into_document_root() {
        let t = TestContext::new(r#"{"a":1,"b":2}"#);
        let url = document_with(&t, json!({"c": 3}));

        dispatch(&t.ctx, &op("-", &url, false, false)).await.unwrap();

        let root = t.ctx.repo.find(&url).unwrap().snapshot().unwrap().unwrap();
        assert_eq!(root, Value::from(json!({"a": 1, "b": 2, "c": 3})));
        assert_eq!(t.stderr.contents(), format!("wrote stdin to {url}\n"));
    }

    #[tokio::test]
    async fn raw_document_to_document_is_refused() {
        let t = TestContext::new("");
        let src = document_with(&t, json!({"s": "x"}));
        let dst = document_with(&t, json!({}));

        for watch in [false, true] {
            let err = dispatch(&t.ctx, &op(&format!("{src}/s"), &dst, watch, true))
                .await
                .unwrap_err();
            assert_eq!(
                err.downcast_ref::<DomainError>(),
                Some(&DomainError::raw_document_to_document())
            );
        }
    }

    #[tokio::test]
    async fn missing_source_document_is_not_found() {
        let t = TestContext::new("");
        let url = amtool_crdt::DocumentId::generate().to_url();

        let err = dispatch(&t.ctx, &op(&url, "-", false, false)).await.unwrap_err();
        assert_eq!(err.downcast_ref::<DomainError>(), Some(&DomainError::document_not_found(&url)));
    }

    #[tokio::test]
    async fn file_to_document_path() {
        let t = TestContext::new("");
        let url = document_with(&t, json!({"cfg": {}}));
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.json");
        std::fs::write(&src, r#"{"on": true}"#).unwrap();

        dispatch(&t.ctx, &op(&src.display().to_string(), &format!("{url}/cfg/x"), false, false))
            .await
            .unwrap();

        let root = t.ctx.repo.find(&url).unwrap().snapshot().unwrap().unwrap();
        assert_eq!(root, Value::from(json!({"cfg": {"x": {"on": true}}})));
    }

    #[tokio::test]
    async fn malformed_json_is_not_a_domain_error() {
        let t = TestContext::new("{nope");
        let err = dispatch(&t.ctx, &op("-", "-", false, false)).await.unwrap_err();
        assert!(err.downcast_ref::<DomainError>().is_none());
    }

    #[tokio::test]
    async fn stdin_lines_are_copied_one_by_one() {
        let t = TestContext::new("first\nsecond\n");
        dispatch(&t.ctx, &op("-", "-", true, true)).await.unwrap();
        assert_eq!(t.stdout.contents(), "firstsecond");
    }

    #[tokio::test]
    async fn stdin_watch_reports_bad_lines_and_continues() {
        let t = TestContext::new("\"text\"\n{\"k\":1}\n");
        let url = document_with(&t, json!({}));

        dispatch(&t.ctx, &op("-", &url, true, false)).await.unwrap();

        let root = t.ctx.repo.find(&url).unwrap().snapshot().unwrap().unwrap();
        assert_eq!(root, Value::from(json!({"k": 1})));
        assert_eq!(
            t.stderr.contents(),
            format!(
                "error: only an object can be written to a document root\n\
                 wrote line of stdin to {url}\n"
            )
        );
    }

    #[tokio::test]
    async fn document_watch_follows_changes() {
        let t = TestContext::new("");
        let url = document_with(&t, json!({"content": {"n": 1}}));
        let (_dir, out) = out_file();
        let copy = op(&format!("{url}/content"), &out.display().to_string(), true, true);
        let handle = t.ctx.repo.find(&url).unwrap();

        let driver = async {
            // Not text: reported, and the watch keeps going.
            eventually(|| t.stderr.contents().starts_with("error: value must be")).await;
            handle
                .change(|doc| doc.put_at(&[], "content", &Value::from("now text")))
                .unwrap();
            eventually(|| read(&out).as_deref() == Some("now text")).await;
        };

        tokio::select! {
            result = dispatch(&t.ctx, &copy) => panic!("watch ended: {result:?}"),
            () = driver => {}
        }
    }

    #[tokio::test]
    async fn file_watch_copies_initially_and_on_change() {
        let t = TestContext::new("");
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.json");
        let dst = dir.path().join("dst.json");
        std::fs::write(&src, "1").unwrap();
        let copy = op(&src.display().to_string(), &dst.display().to_string(), true, false);

        let driver = async {
            eventually(|| read(&dst).as_deref() == Some("1\n")).await;
            std::fs::write(&src, "[2]").unwrap();
            eventually(|| read(&dst).as_deref() == Some("[\n  2\n]\n")).await;
        };

        tokio::select! {
            result = dispatch(&t.ctx, &copy) => panic!("watch ended: {result:?}"),
            () = driver => {}
        }
    }

    #[tokio::test]
    async fn raw_copy_replaces_invalid_utf8() {
        let t = TestContext::new("");
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.bin");
        std::fs::write(&src, [b'h', 0xff, b'i']).unwrap();

        dispatch(&t.ctx, &op(&src.display().to_string(), "-", false, true))
            .await
            .unwrap();
        assert_eq!(t.stdout.contents(), "h\u{fffd}i");
    }

    #[tokio::test]
    async fn raw_stdin_lines_tolerate_invalid_utf8_and_crlf() {
        let t = TestContext::new(b"a\xffb\r\nok\n");
        dispatch(&t.ctx, &op("-", "-", true, true)).await.unwrap();
        assert_eq!(t.stdout.contents(), "a\u{fffd}bok");
    }

    #[tokio::test]
    async fn document_watch_reports_deletion_and_keeps_watching() {
        let t = TestContext::new("");
        let url = document_with(&t, json!({"n": 1}));
        let (_dir, out) = out_file();
        let copy = op(&format!("{url}/n"), &out.display().to_string(), true, false);

        let driver = async {
            eventually(|| read(&out).as_deref() == Some("1\n")).await;
            t.ctx.repo.delete(&url).unwrap();
            let expected = format!("error: document {url} not found\n");
            eventually(|| t.stderr.contents().ends_with(&expected)).await;
            // Still running: the select below fails the test if the watch ends.
            tokio::time::sleep(Duration::from_millis(200)).await;
        };

        tokio::select! {
            result = dispatch(&t.ctx, &copy) => panic!("watch ended: {result:?}"),
            () = driver => {}
        }
    }
}

