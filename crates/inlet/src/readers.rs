//! 🔌 Readers — where the real I/O happens.
//!
//! 🚰 Every reader here is a faucet: nothing flows until somebody turns the handle
//! (`next_record().await`). Files are opened and clusters are queried on the first
//! pull, not at construction time, and everything is released when the reader is
//! exhausted or dropped.
//!
//! 🎭 This module is the casting agency. Need lines from a JSON-lines dump? Events out
//! of a JSON document too big to love? Every file in a folder, gzipped or not? A scroll
//! through an Elasticsearch index, a random sample of one, or pages out of Solr? We've
//! got a reader for that.
//!
//! 🦆 The duck is here because every module gets one. Do not question the duck.

pub mod elasticsearch;
pub mod folder;
pub mod json_lines;
pub mod large_json;
pub mod solr;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, Stream};

use crate::common::{DocumentRecord, SourceStats};

pub use elasticsearch::{ElasticOptions, ElasticSampleSource, ElasticScrollSource, SampleOptions};
pub use folder::FolderSource;
pub use json_lines::JsonLinesSource;
pub use large_json::{LargeJsonOptions, LargeJsonSource};
pub use solr::{SolrOptions, SolrSource};

/// 🚰 A pull-based producer of [`DocumentRecord`]s.
///
/// # Contract 📜
/// - `next_record` returns `Ok(Some(record))` while documents remain, `Ok(None)` at the end.
/// - Record-level trouble (a bad line, an undecodable file, a malformed hit) is logged and
///   skipped inside the reader. It never surfaces as `Err`.
/// - `Err` is reserved for the fatal stuff: missing files, dead clusters, non-2xx answers.
/// - Once `Ok(None)` comes back, it keeps coming back.
#[async_trait]
pub trait DocumentSource: std::fmt::Debug + Send {
    async fn next_record(&mut self) -> Result<Option<DocumentRecord>>;

    /// 📊 Running totals for this reader.
    fn stats(&self) -> SourceStats;
}

/// 🎭 The many faces of a reader. `read_input` hands one of these back, and callers
/// never need to know whether the bytes came from disk or a cluster.
#[derive(Debug)]
pub enum SourceBackend {
    JsonLines(JsonLinesSource),
    LargeJson(LargeJsonSource),
    Folder(FolderSource),
    Solr(SolrSource),
    ElasticScroll(ElasticScrollSource),
    ElasticSample(ElasticSampleSource),
}

impl SourceBackend {
    /// 🏷️ Short name for logs and the summary table.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::JsonLines(_) => "json_stream",
            Self::LargeJson(_) => "large_json",
            Self::Folder(_) => "folder",
            Self::Solr(_) => "solr",
            Self::ElasticScroll(_) => "elastic (scroll)",
            Self::ElasticSample(_) => "elastic (sample)",
        }
    }

    /// 🌊 Adapt the reader into a `futures::Stream` for callers that prefer combinators.
    pub fn into_stream(self) -> impl Stream<Item = Result<DocumentRecord>> + Send {
        stream::try_unfold(self, |mut source| async move {
            Ok(source.next_record().await?.map(|record| (record, source)))
        })
    }
}

#[async_trait]
impl DocumentSource for SourceBackend {
    async fn next_record(&mut self) -> Result<Option<DocumentRecord>> {
        match self {
            Self::JsonLines(s) => s.next_record().await,
            Self::LargeJson(s) => s.next_record().await,
            Self::Folder(s) => s.next_record().await,
            Self::Solr(s) => s.next_record().await,
            Self::ElasticScroll(s) => s.next_record().await,
            Self::ElasticSample(s) => s.next_record().await,
        }
    }

    fn stats(&self) -> SourceStats {
        match self {
            Self::JsonLines(s) => s.stats(),
            Self::LargeJson(s) => s.stats(),
            Self::Folder(s) => s.stats(),
            Self::Solr(s) => s.stats(),
            Self::ElasticScroll(s) => s.stats(),
            Self::ElasticSample(s) => s.stats(),
        }
    }
}
