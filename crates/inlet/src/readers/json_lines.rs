//! 📂 JSON-lines reader — one JSON object per line, one record per object.
//!
//! The file is opened on the first pull and read line by line through a `BufReader`.
//! A line that refuses to parse gets a `warn!` and a seat in `stats.skipped`, and the
//! reader moves on. One bad line does not end the show.
//!
//! 🏷️ Identifier: `<file_name>/<field>[<line_index>]`, zero-based physical line
//! number, blank lines counted but never emitted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tracing::{debug, trace, warn};

use crate::common::{DocumentRecord, SourceStats};
use crate::extract::extract_content;
use crate::readers::DocumentSource;

pub struct JsonLinesSource {
    file_name: String,
    field: String,
    reader: Option<BufReader<File>>,
    exhausted: bool,
    next_line_index: u64,
    line: Vec<u8>,
    stats: SourceStats,
}

// -- the BufReader stays out of Debug, nobody wants to read a file handle
impl std::fmt::Debug for JsonLinesSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSource")
            .field("file_name", &self.file_name)
            .field("field", &self.field)
            .field("next_line_index", &self.next_line_index)
            .field("stats", &self.stats)
            .finish()
    }
}

impl JsonLinesSource {
    /// 🚀 No I/O here. The file waits until someone actually asks for a record.
    pub fn new(file_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            field: field.into(),
            reader: None,
            exhausted: false,
            next_line_index: 0,
            line: Vec::with_capacity(8 * 1024),
            stats: SourceStats::default(),
        }
    }

    async fn open(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.file_name).await.with_context(|| {
            format!(
                "💀 The door to '{}' would not budge. We knocked. We checked the path. \
                 The JSON-lines file stays unopened and we stay outside.",
                self.file_name
            )
        })?;
        debug!("📂 opened JSON-lines source '{}'", self.file_name);
        Ok(BufReader::new(file))
    }
}

#[async_trait]
impl DocumentSource for JsonLinesSource {
    async fn next_record(&mut self) -> Result<Option<DocumentRecord>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }
            if self.reader.is_none() {
                self.reader = Some(self.open().await?);
            }
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };

            self.line.clear();
            let bytes_read = reader
                .read_until(b'\n', &mut self.line)
                .await
                .with_context(|| format!("💀 reading '{}' fell over mid-line", self.file_name))?;
            if bytes_read == 0 {
                trace!("🏁 '{}' is out of lines", self.file_name);
                self.exhausted = true;
                self.reader = None;
                return Ok(None);
            }

            let line_index = self.next_line_index;
            self.next_line_index += 1;

            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let value: Value = match serde_json::from_slice(&self.line) {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        "⚠️ Unable to process line {} of '{}': {} ({})",
                        line_index,
                        self.file_name,
                        String::from_utf8_lossy(&self.line).trim_end(),
                        err
                    );
                    self.stats.skipped += 1;
                    continue;
                }
            };

            match extract_content(&value, &self.field, None, false) {
                Ok(extracted) => {
                    self.stats.emitted += 1;
                    return Ok(Some(DocumentRecord::new(
                        format!("{}/{}[{}]", self.file_name, self.field, line_index),
                        extracted.content,
                    )));
                }
                Err(err) => {
                    debug!(
                        "🕳️ line {} of '{}' has no usable '{}': {}",
                        line_index, self.file_name, self.field, err
                    );
                    self.stats.dropped += 1;
                }
            }
        }
    }

    fn stats(&self) -> SourceStats {
        self.stats
    }
}
