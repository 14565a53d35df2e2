//! 🧭 Source resolver — "here's a string, figure out what it is and hand me a reader."
//!
//! Classification is plain string inspection ([`resolve_source_kind`]), first match wins:
//!
//! 1. `auto` + the source mentions `8983`, or explicit `solr` → Solr
//! 2. `auto` + the source mentions `9200`, or explicit `elastic` → Elasticsearch
//! 3. `auto` + a `.js`/`.json` extension, or explicit `json_stream` → probe the opening
//!    lines (JSON-lines or large JSON?)
//! 4. explicit `large_json` → large JSON
//! 5. `auto` + no extension at all, or explicit `folder` → folder
//! 6. anything else → [`InletError::UnrecognizedSource`]
//!
//! Yes, a file called `report-9200.json` goes to Elasticsearch. Port numbers in paths are
//! a lifestyle choice and the resolver respects it. Say `source_type = "json_stream"`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tracing::{debug, info, trace};

use crate::common::SourceKind;
use crate::errors::InletError;
use crate::readers::{
    ElasticOptions, ElasticSampleSource, ElasticScrollSource, FolderSource, JsonLinesSource,
    LargeJsonOptions, LargeJsonSource, SolrOptions, SolrSource, SourceBackend,
};

const SOLR_PORT_HINT: &str = "8983";
const ELASTIC_PORT_HINT: &str = "9200";
const JSON_EXTENSIONS: [&str; 2] = ["js", "json"];

/// 📥 Everything `read_input` needs. Backend knobs live in their own sections and
/// default to something reasonable when left out.
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// File path, folder path, or server address.
    pub source: String,
    #[serde(default)]
    pub source_type: SourceKind,
    #[serde(default = "default_content_field")]
    pub content_field: String,
    /// 📦 Passed through untouched for whatever consumes the records.
    #[serde(default)]
    pub output_args: Option<Map<String, Value>>,
    /// ⏱️ Seconds a downstream writer may wait for uploads to settle. Carried, never read here.
    #[serde(default)]
    pub synchronous_wait: f64,
    #[serde(default)]
    pub large_json: LargeJsonOptions,
    #[serde(default)]
    pub elastic: ElasticOptions,
    #[serde(default)]
    pub solr: SolrOptions,
}

fn default_content_field() -> String {
    "text".to_string()
}

impl InputConfig {
    /// Defaults everywhere except the source itself.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_type: SourceKind::Auto,
            content_field: default_content_field(),
            output_args: None,
            synchronous_wait: 0.0,
            large_json: LargeJsonOptions::default(),
            elastic: ElasticOptions::default(),
            solr: SolrOptions::default(),
        }
    }
}

/// 🎯 What the descriptor turned out to be, before any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSource {
    Solr,
    Elastic,
    /// `.js`/`.json` under `auto`, or `json_stream`: the opening lines decide between
    /// JSON-lines and large JSON.
    JsonProbe,
    LargeJson,
    Folder,
}

fn extension(source: &str) -> Option<&str> {
    Path::new(source).extension().and_then(|ext| ext.to_str())
}

/// 🧭 The classification half of `read_input`. Pure string inspection, touches nothing.
pub fn resolve_source_kind(source: &str, kind: SourceKind) -> Result<ResolvedSource, InletError> {
    let auto = kind == SourceKind::Auto;
    let ext = extension(source);

    let resolved = if (auto && source.contains(SOLR_PORT_HINT)) || kind == SourceKind::Solr {
        ResolvedSource::Solr
    } else if (auto && source.contains(ELASTIC_PORT_HINT)) || kind == SourceKind::Elastic {
        ResolvedSource::Elastic
    } else if (auto && ext.is_some_and(|ext| JSON_EXTENSIONS.contains(&ext)))
        || kind == SourceKind::JsonStream
    {
        ResolvedSource::JsonProbe
    } else if kind == SourceKind::LargeJson {
        ResolvedSource::LargeJson
    } else if (auto && ext.is_none()) || kind == SourceKind::Folder {
        ResolvedSource::Folder
    } else {
        return Err(InletError::UnrecognizedSource {
            source_descriptor: source.to_string(),
        });
    };
    Ok(resolved)
}

/// 👃 Reads just enough of a `.json` file to tell JSON-lines from one big document.
///
/// Blank lines are ignored. A line that starts with `{` and parses as an object settles it:
/// JSON-lines. A line that starts with `{` but doesn't parse is what the JSON-lines reader
/// would skip anyway, so keep looking. The first line that doesn't start with `{` at all
/// (a lone `[`, the inside of a pretty-printed object, a scalar) means large JSON. Running
/// out of lines means JSON-lines: empty, or nothing but broken lines.
pub async fn sniff_json_lines(path: &str) -> Result<bool> {
    let file = File::open(path)
        .await
        .with_context(|| format!("💀 Could not open '{path}' to see what kind of JSON it is"))?;
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut line)
            .await
            .with_context(|| format!("💀 Reading the first line of '{path}' went sideways"))?;
        if bytes_read == 0 {
            return Ok(true);
        }
        let Some(first) = line.iter().find(|b| !b.is_ascii_whitespace()) else {
            continue;
        };
        if *first != b'{' {
            return Ok(false);
        }
        if let Ok(Value::Object(_)) = serde_json::from_slice::<Value>(&line) {
            return Ok(true);
        }
        trace!("👃 '{path}' opens with a broken line, reading on");
    }
}

fn large_json_source(config: &InputConfig) -> Result<LargeJsonSource> {
    LargeJsonSource::new(
        config.source.clone(),
        config.large_json.resolved_prefix(&config.content_field),
        &config.large_json.resolved_event(),
    )
}

/// 📥 Resolve the source and build its reader. The reader itself is lazy; only the
/// `.json` probe reads anything here.
pub async fn read_input(config: &InputConfig) -> Result<SourceBackend> {
    let resolved = resolve_source_kind(&config.source, config.source_type)?;
    debug!(
        "🧭 '{}' ({}) resolved to {:?}",
        config.source, config.source_type, resolved
    );

    let backend = match resolved {
        ResolvedSource::Solr => SourceBackend::Solr(SolrSource::new(
            &config.source,
            config.content_field.clone(),
            &config.solr,
        )?),
        ResolvedSource::Elastic if config.elastic.sample.is_some() => SourceBackend::ElasticSample(
            ElasticSampleSource::new(&config.source, &config.content_field, &config.elastic)?,
        ),
        ResolvedSource::Elastic => SourceBackend::ElasticScroll(ElasticScrollSource::new(
            &config.source,
            &config.content_field,
            &config.elastic,
        )?),
        ResolvedSource::JsonProbe => {
            if sniff_json_lines(&config.source).await? {
                SourceBackend::JsonLines(JsonLinesSource::new(
                    config.source.clone(),
                    config.content_field.clone(),
                ))
            } else {
                debug!("🐘 '{}' is one big document, switching to the streaming scanner", config.source);
                SourceBackend::LargeJson(large_json_source(config)?)
            }
        }
        ResolvedSource::LargeJson => SourceBackend::LargeJson(large_json_source(config)?),
        ResolvedSource::Folder => SourceBackend::Folder(FolderSource::new(config.source.clone())),
    };

    info!("📥 reading '{}' with the {} reader", config.source, backend.kind_name());
    Ok(backend)
}
