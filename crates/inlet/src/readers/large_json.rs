//! 🐘 Large-JSON reader — for the single JSON document that is too big to love.
//!
//! Instead of parsing the whole thing, the file goes through the
//! [`JsonEventReader`](crate::json_events::JsonEventReader) and every time the
//! configured `(prefix, event)` pair shows up, its value becomes a record.
//! For a chat export shaped like `[{"content": "..."}, ...]` that's
//! `("item.content", "string")`.
//!
//! ⚠️ Unlike the line-based readers, malformed JSON here is fatal: an event stream has
//! no "next line" to resynchronize on.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{fs::File, io::BufReader};
use tracing::{debug, trace};

use crate::common::{DocumentRecord, SourceStats};
use crate::extract::render_content;
use crate::json_events::{JsonEventKind, JsonEventReader};
use crate::readers::DocumentSource;

/// 🔧 Which events become records. Both optional in config; the resolver fills
/// `prefix` with `item.<content_field>` when it is left out.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LargeJsonOptions {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

fn default_event() -> &'static str {
    JsonEventKind::String.as_str()
}

impl LargeJsonOptions {
    pub fn resolved_prefix(&self, content_field: &str) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| format!("item.{content_field}"))
    }

    pub fn resolved_event(&self) -> String {
        self.event
            .clone()
            .unwrap_or_else(|| default_event().to_string())
    }
}

pub struct LargeJsonSource {
    file_name: String,
    prefix: String,
    event: JsonEventKind,
    events: Option<JsonEventReader<BufReader<File>>>,
    exhausted: bool,
    matches: u64,
    stats: SourceStats,
}

impl std::fmt::Debug for LargeJsonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeJsonSource")
            .field("file_name", &self.file_name)
            .field("prefix", &self.prefix)
            .field("event", &self.event)
            .field("stats", &self.stats)
            .finish()
    }
}

impl LargeJsonSource {
    /// 🚀 Validates the event name up front, opens nothing.
    pub fn new(
        file_name: impl Into<String>,
        prefix: impl Into<String>,
        event: &str,
    ) -> Result<Self> {
        let Some(event_kind) = JsonEventKind::from_name(event) else {
            bail!(
                "💀 '{event}' is not a JSON event. Pick one of: null, boolean, number, string, \
                 map_key, start_map, end_map, start_array, end_array."
            );
        };
        Ok(Self {
            file_name: file_name.into(),
            prefix: prefix.into(),
            event: event_kind,
            events: None,
            exhausted: false,
            matches: 0,
            stats: SourceStats::default(),
        })
    }

    async fn open(&self) -> Result<JsonEventReader<BufReader<File>>> {
        let file = File::open(&self.file_name).await.with_context(|| {
            format!(
                "💀 Could not open the large JSON document '{}'. It may be large. It is definitely not open.",
                self.file_name
            )
        })?;
        debug!(
            "🐘 scanning '{}' for ({}, {}) events",
            self.file_name, self.prefix, self.event
        );
        Ok(JsonEventReader::new(BufReader::new(file)))
    }
}

#[async_trait]
impl DocumentSource for LargeJsonSource {
    async fn next_record(&mut self) -> Result<Option<DocumentRecord>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.events.is_none() {
            self.events = Some(self.open().await?);
        }
        let Some(events) = self.events.as_mut() else {
            return Ok(None);
        };

        while let Some(event) = events
            .next_event()
            .await
            .with_context(|| format!("💀 '{}' is not the JSON it claimed to be", self.file_name))?
        {
            if event.kind != self.event || event.prefix != self.prefix {
                continue;
            }
            let n = self.matches;
            self.matches += 1;
            match event.value.as_ref().and_then(render_content) {
                Some(content) => {
                    self.stats.emitted += 1;
                    return Ok(Some(DocumentRecord::new(
                        format!("{}/{}[{}]", event.prefix, event.kind, n),
                        content,
                    )));
                }
                None => self.stats.dropped += 1,
            }
        }

        trace!("🏁 '{}' scanned to the end, {} match(es)", self.file_name, self.matches);
        self.exhausted = true;
        self.events = None;
        Ok(None)
    }

    fn stats(&self) -> SourceStats {
        self.stats
    }
}
