//! # 📡 THE ELASTICSEARCH READERS
//!
//! Two ways to drain an index:
//!
//! - [`ElasticScrollSource`] — everything, page by page, following the scroll cursor
//!   until the cluster stops handing one out or a page comes back empty.
//! - [`ElasticSampleSource`] — a random sample: independent `from`/`size` windows at
//!   random offsets until enough documents have been seen. Duplicates allowed.
//!
//! Both share an [`ElasticClient`] (HTTP, auth, URL hygiene) and a [`HitExtractor`]
//! (hit → record, with a capped failure log so a systematically broken index can't
//! flood your terminal).
//!
//! 🔒 Auth priority: `api_key` beats basic auth. This is not a democracy.
//! 💀 No retries. A transport failure or non-2xx answer is the caller's problem now.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

mod sample_source;
mod scroll_source;

pub use sample_source::{ElasticSampleSource, SampleWindow};
pub use scroll_source::ElasticScrollSource;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{trace, warn};

use crate::common::{DocumentRecord, SourceStats};
use crate::extract::{FailureLogBudget, SearchHit, extract_content};

/// 🔧 Everything the Elasticsearch readers need beyond the cluster address.
///
/// Lives next to the readers that use it. `index` is required in practice; it's an
/// `Option` only so an `[input.elastic]`-less config still deserializes for file sources.
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticOptions {
    #[serde(default)]
    pub index: Option<String>,
    /// 📄 Overrides the top-level `content_field` for this backend.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub subfield: Option<String>,
    /// 🦖 Legacy mapping type, for clusters old enough to still have them.
    #[serde(default)]
    pub doc_type: Option<String>,
    /// 🏷️ Use the hit's `_id` as the record id.
    #[serde(default)]
    pub include_id: bool,
    /// ⏱️ Scroll context keep-alive.
    #[serde(default = "default_scroll")]
    pub scroll: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// 🎲 Present = random-sample mode. Absent = full scroll.
    #[serde(default)]
    pub sample: Option<SampleOptions>,
}

fn default_scroll() -> String {
    "5m".to_string()
}

fn default_page_size() -> usize {
    500
}

impl Default for ElasticOptions {
    fn default() -> Self {
        Self {
            index: None,
            field: None,
            subfield: None,
            doc_type: None,
            include_id: false,
            scroll: default_scroll(),
            page_size: default_page_size(),
            username: None,
            password: None,
            api_key: None,
            sample: None,
        }
    }
}

/// 🎲 Random-sample knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct SampleOptions {
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_n_samples")]
    pub n_samples: u64,
    /// Same seed, same windows. For reproducible samples and calm tests.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_batch_size() -> u64 {
    400
}

fn default_n_samples() -> u64 {
    1_000_000
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            n_samples: default_n_samples(),
            seed: None,
        }
    }
}

/// 📡 The slice of a search response we care about.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    pub scroll_id: Option<String>,
    #[serde(default)]
    pub hits: HitsEnvelope,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct HitsEnvelope {
    // -- kept as raw values: a malformed hit is a skip, not a failed page
    #[serde(default)]
    pub hits: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// 📡 Thin HTTP wrapper around the handful of endpoints the readers call.
#[derive(Debug, Clone)]
pub(crate) struct ElasticClient {
    http: reqwest::Client,
    base_url: String,
    index: String,
    doc_type: Option<String>,
    username: Option<String>,
    password: Option<String>,
    api_key: Option<String>,
}

/// 🌐 `localhost:9200` → `http://localhost:9200`. Trailing slashes trimmed, because
/// `https://host//index` is one slash of difference and infinite suffering of difference.
pub(crate) fn normalize_base_url(source: &str) -> String {
    let trimmed = source.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .context("💀 The HTTP client refused to be born. Probably a TLS stack having a bad day.")
}

impl ElasticClient {
    /// 🚀 Builds the client. Talks to nobody yet.
    pub(crate) fn new(url: &str, options: &ElasticOptions) -> Result<Self> {
        let Some(index) = options.index.clone() else {
            bail!(
                "💀 An Elasticsearch source needs an index. Set `index` under [input.elastic] \
                 (or INLET_INPUT__ELASTIC__INDEX). We can't scroll through 'somewhere'."
            );
        };
        Ok(Self {
            http: build_http_client()?,
            base_url: normalize_base_url(url),
            index,
            doc_type: options.doc_type.clone(),
            username: options.username.clone(),
            password: options.password.clone(),
            api_key: options.api_key.clone(),
        })
    }

    pub(crate) fn index(&self) -> &str {
        &self.index
    }

    fn index_url(&self, endpoint: &str) -> String {
        match &self.doc_type {
            Some(doc_type) => format!("{}/{}/{}/{}", self.base_url, self.index, doc_type, endpoint),
            None => format!("{}/{}/{}", self.base_url, self.index, endpoint),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(api_key) = &self.api_key {
            request.header("Authorization", format!("ApiKey {api_key}"))
        } else if let Some(username) = &self.username {
            request.basic_auth(username, self.password.as_ref())
        } else {
            request
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self
            .authorize(request)
            .header("Content-Type", "application/json")
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 The {what} request never made it to Elasticsearch at '{}'. \
                     Check that the cluster is up and reachable.",
                    self.base_url
                )
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("💀 The {what} response body got lost on the way back"))?;
        if !status.is_success() {
            bail!("💀 Elasticsearch answered the {what} request with {status}: {body}");
        }
        serde_json::from_str(&body)
            .with_context(|| format!("💀 The {what} response was not the JSON we expected: {body}"))
    }

    /// 📜 `POST /{index}/_search?scroll=…` with a match-all query.
    pub(crate) async fn open_scroll(&self, scroll: &str, page_size: usize) -> Result<SearchResponse> {
        let url = format!("{}?scroll={}", self.index_url("_search"), scroll);
        let body = json!({"query": {"match_all": {}}, "size": page_size});
        trace!("📜 opening scroll on '{}'", url);
        self.send(self.http.post(url).body(body.to_string()), "initial scroll search")
            .await
    }

    /// 🔄 `POST /_search/scroll` with the cursor from the previous page.
    pub(crate) async fn continue_scroll(&self, scroll: &str, scroll_id: &str) -> Result<SearchResponse> {
        let url = format!("{}/_search/scroll", self.base_url);
        let body = json!({"scroll": scroll, "scroll_id": scroll_id});
        self.send(self.http.post(url).body(body.to_string()), "scroll continuation")
            .await
    }

    /// 🗑️ `DELETE /_search/scroll`. Best-effort: callers log and move on.
    pub(crate) async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let url = format!("{}/_search/scroll", self.base_url);
        let body = json!({"scroll_id": scroll_id});
        let _: Value = self
            .send(self.http.delete(url).body(body.to_string()), "clear scroll")
            .await?;
        Ok(())
    }

    /// 🔢 `GET /{index}/_count`.
    pub(crate) async fn count(&self) -> Result<u64> {
        let response: CountResponse = self
            .send(self.http.get(self.index_url("_count")), "document count")
            .await?;
        Ok(response.count)
    }

    /// 🎲 `POST /{index}/_search` for one `from`/`size` window.
    pub(crate) async fn search_window(&self, from: u64, size: u64) -> Result<SearchResponse> {
        let body = json!({"query": {"match_all": {}}, "from": from, "size": size});
        self.send(
            self.http.post(self.index_url("_search")).body(body.to_string()),
            "sample search",
        )
        .await
    }
}

/// 🎯 Turns raw hits into records, with a bounded appetite for complaining.
#[derive(Debug)]
pub(crate) struct HitExtractor {
    index: String,
    field: String,
    subfield: Option<String>,
    include_id: bool,
    position: u64,
    failure_log: FailureLogBudget,
}

impl HitExtractor {
    pub(crate) fn new(index: &str, field: &str, options: &ElasticOptions) -> Self {
        Self {
            index: index.to_string(),
            field: options.field.clone().unwrap_or_else(|| field.to_string()),
            subfield: options.subfield.clone(),
            include_id: options.include_id,
            position: 0,
            failure_log: FailureLogBudget::default(),
        }
    }

    /// `None` = the hit was skipped (and maybe logged, if the budget allows).
    pub(crate) fn record_from(&mut self, raw: Value, stats: &mut SourceStats) -> Option<DocumentRecord> {
        let extracted = SearchHit::deserialize(&raw)
            .map_err(|err| err.to_string())
            .and_then(|hit| {
                extract_content(&hit, &self.field, self.subfield.as_deref(), self.include_id)
                    .map_err(|err| err.to_string())
            });

        match extracted {
            Ok(extracted) => {
                let position = self.position;
                self.position += 1;
                let id = match extracted.native_id {
                    Some(native_id) => native_id,
                    None => format!("{}/{}[{}]", self.index, extracted.field_path, position),
                };
                stats.emitted += 1;
                Some(DocumentRecord::new(id, extracted.content))
            }
            Err(reason) => {
                stats.skipped += 1;
                if self.failure_log.try_spend() {
                    warn!("⚠️ Unable to process row ({}): {}", reason, raw);
                }
                None
            }
        }
    }
}
