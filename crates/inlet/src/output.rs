//! 🚰 NDJSON sink — one `{"id": …, "content": …}` object per line, to a file or stdout.
//!
//! A `BufWriter` over whichever handle was asked for. `close` flushes; there's no async
//! Drop, so forgetting to call it can leave the tail of the output in the buffer.
//!
//! ⚠️ `File::create` truncates an existing file. No warning, no backup.

use anyhow::{Context, Result};
use tokio::{
    fs::File,
    io::{self, AsyncWrite, AsyncWriteExt, BufWriter},
};
use tracing::trace;

use crate::common::DocumentRecord;

pub struct NdjsonSink {
    target: String,
    writer: BufWriter<Box<dyn AsyncWrite + Send + Unpin>>,
    written: u64,
}

impl std::fmt::Debug for NdjsonSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonSink")
            .field("target", &self.target)
            .field("written", &self.written)
            .finish()
    }
}

impl NdjsonSink {
    /// 🚀 `None` writes to stdout; `Some(path)` creates (or truncates) the file.
    pub async fn open(file_name: Option<&str>) -> Result<Self> {
        match file_name {
            Some(file_name) => {
                let file = File::create(file_name).await.with_context(|| {
                    format!(
                        "💀 The output file '{file_name}' could not be conjured into existence. \
                         Does the parent directory exist?"
                    )
                })?;
                Ok(Self::from_writer(file_name, Box::new(file)))
            }
            None => Ok(Self::from_writer("<stdout>", Box::new(io::stdout()))),
        }
    }

    pub fn from_writer(target: impl Into<String>, writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            target: target.into(),
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    pub async fn write_record(&mut self, record: &DocumentRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("💀 A record refused to become JSON")?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .with_context(|| format!("💀 Writing to '{}' failed", self.target))?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// 🗑️ Flush and let go.
    pub async fn close(&mut self) -> Result<()> {
        trace!("🎬 flushing {} record(s) to '{}'", self.written, self.target);
        self.writer
            .flush()
            .await
            .with_context(|| format!("💀 Flushing '{}' failed. The last records may be lost.", self.target))
    }
}
