//! 📦 Common data structures — the building blocks of inlet.
//!
//! Every reader in this crate, no matter how exotic its origin story (a gzipped
//! folder, a 40GB JSON blob, a cluster that answers on port 9200), ends up
//! handing the caller the same humble thing: a [`DocumentRecord`]. One id. One
//! piece of text. No opinions.
//!
//! 🦆

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::InletError;

/// 🎯 A single `(identifier, content)` pair — the atomic unit of ingestion.
///
/// Records with absent content never get built. If a field is missing, the
/// reader drops the row before it ever becomes one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// 🏷️ Deterministic for file sources (`path/field[n]`), store-native or
    /// positional for remote ones.
    pub id: String,
    /// 📄 The text to analyze.
    pub content: String,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// 📊 Per-reader bookkeeping: what made it out, what got skipped, what never had content.
///
/// - `emitted`: records handed to the caller
/// - `skipped`: record-level failures (bad JSON line, undecodable file, malformed hit)
/// - `dropped`: rows that parsed fine but had no content under the requested field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub emitted: u64,
    pub skipped: u64,
    pub dropped: u64,
}

/// 🎭 Which reader services a source. `Auto` lets the resolver sniff it out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Auto,
    Solr,
    Elastic,
    JsonStream,
    LargeJson,
    Folder,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Solr => "solr",
            Self::Elastic => "elastic",
            Self::JsonStream => "json_stream",
            Self::LargeJson => "large_json",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = InletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "solr" => Ok(Self::Solr),
            "elastic" => Ok(Self::Elastic),
            "json_stream" => Ok(Self::JsonStream),
            "large_json" => Ok(Self::LargeJson),
            "folder" => Ok(Self::Folder),
            other => Err(InletError::UnknownSourceKind(other.to_string())),
        }
    }
}
