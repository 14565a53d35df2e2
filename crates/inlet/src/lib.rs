//! 🚪 inlet — every corpus has to come in through somewhere.
//!
//! JSON-lines files, JSON documents too big to love, folders of (maybe gzipped) text,
//! Elasticsearch indices, Solr cores: [`read_input`] takes a source descriptor and hands
//! back one lazy reader yielding `(id, content)` [`DocumentRecord`]s. Nothing is read
//! until you ask for the next record.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use inlet::{DocumentSource, InputConfig, read_input};
//!
//! let mut reader = read_input(&InputConfig::new("/data/articles.json")).await?;
//! while let Some(record) = reader.next_record().await? {
//!     println!("{} → {} chars", record.id, record.content.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`run`] is the batteries-included version: drain a source into NDJSON with a spinner.

pub mod app_config;
pub mod common;
pub mod errors;
pub mod extract;
pub mod json_events;
pub mod output;
mod progress;
pub mod readers;
pub mod resolver;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

pub use app_config::{AppConfig, ConfigOverrides, OutputConfig, load_config, load_config_with};
pub use common::{DocumentRecord, SourceKind, SourceStats};
pub use errors::InletError;
pub use readers::{DocumentSource, SourceBackend};
pub use resolver::{InputConfig, ResolvedSource, read_input, resolve_source_kind};

use crate::output::NdjsonSink;
use crate::progress::{ProgressMetrics, summary_table};

/// 📋 What a [`run`] did, for the table at the end.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: String,
    pub reader: &'static str,
    pub stats: SourceStats,
    pub written: u64,
    pub elapsed: Duration,
    /// The output limit cut the source short.
    pub truncated: bool,
}

impl RunSummary {
    /// 🍽️ Borderless two-column summary, ready to print.
    pub fn render(&self) -> String {
        let mut table = summary_table(
            &self.source,
            self.reader,
            self.stats,
            self.written,
            self.elapsed,
        )
        .to_string();
        if self.truncated {
            table.push_str("\n(stopped at the output limit)");
        }
        table
    }
}

/// 🚀 Resolve the input, drain it into the NDJSON sink, report.
///
/// Stops early at `output.limit`. A fatal reader error aborts the run after a
/// best-effort flush, so whatever was already read still makes it out.
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    let AppConfig { input, output } = app_config;

    let mut source = read_input(&input)
        .await
        .with_context(|| format!("💀 Could not set up a reader for '{}'", input.source))?;
    let mut sink = NdjsonSink::open(output.file_name.as_deref()).await?;
    let mut progress = ProgressMetrics::new(input.source.clone(), output.progress);

    let mut truncated = false;
    let drained = loop {
        if output.limit.is_some_and(|limit| sink.written() >= limit) {
            truncated = true;
            break Ok(());
        }
        match source.next_record().await {
            Ok(Some(record)) => {
                if let Err(err) = sink.write_record(&record).await {
                    break Err(err);
                }
                progress.update(1);
            }
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };

    progress.finish();
    let closed = sink.close().await;
    drained.with_context(|| format!("💀 Reading '{}' stopped partway through", input.source))?;
    closed?;

    let summary = RunSummary {
        source: input.source,
        reader: source.kind_name(),
        stats: source.stats(),
        written: sink.written(),
        elapsed: progress.elapsed(),
        truncated,
    };
    info!(
        "✅ wrote {} record(s) from '{}' ({})",
        summary.written, summary.source, summary.reader
    );
    Ok(summary)
}
