//! ☀️ Solr reader — pages through `/select` with `start`/`rows` until `numFound` says stop.
//!
//! Each doc goes through the content extractor. The doc's own `id` becomes the record
//! id when it has one; otherwise it's `<field>[<n>]`. Docs without the content field
//! are skipped, and only the first ten of those get a log line.

use std::vec;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::common::{DocumentRecord, SourceStats};
use crate::extract::{FailureLogBudget, FieldIndexable, SolrDocument, extract_content};
use crate::readers::DocumentSource;
use crate::readers::elasticsearch::{build_http_client, normalize_base_url};

#[derive(Debug, Deserialize, Clone)]
pub struct SolrOptions {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_rows")]
    pub rows: u64,
}

fn default_query() -> String {
    "*:*".to_string()
}

fn default_rows() -> u64 {
    1000
}

impl Default for SolrOptions {
    fn default() -> Self {
        Self {
            query: default_query(),
            rows: default_rows(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<serde_json::Value>,
}

#[derive(Debug)]
pub struct SolrSource {
    http: reqwest::Client,
    select_url: String,
    field: String,
    options: SolrOptions,
    next_start: u64,
    num_found: Option<u64>,
    page: vec::IntoIter<serde_json::Value>,
    position: u64,
    done: bool,
    failure_log: FailureLogBudget,
    stats: SourceStats,
}

impl SolrSource {
    /// 🚀 Validates the URL. The core stays unbothered until the first pull.
    pub fn new(url: &str, field: impl Into<String>, options: &SolrOptions) -> Result<Self> {
        if options.rows == 0 {
            bail!("💀 Solr rows = 0 means every page is empty. Ask for at least one.");
        }
        let select_url = format!("{}/select", normalize_base_url(url));
        Url::parse(&select_url)
            .with_context(|| format!("💀 '{select_url}' doesn't look like a Solr URL"))?;
        Ok(Self {
            http: build_http_client()?,
            select_url,
            field: field.into(),
            options: options.clone(),
            next_start: 0,
            num_found: None,
            page: Vec::new().into_iter(),
            position: 0,
            done: false,
            failure_log: FailureLogBudget::default(),
            stats: SourceStats::default(),
        })
    }

    async fn fetch_page(&self, start: u64) -> Result<SelectResponse> {
        let mut url = Url::parse(&self.select_url)
            .with_context(|| format!("💀 '{}' doesn't look like a Solr URL", self.select_url))?;
        url.query_pairs_mut()
            .append_pair("q", &self.options.query)
            .append_pair("wt", "json")
            .append_pair("start", &start.to_string())
            .append_pair("rows", &self.options.rows.to_string());
        trace!("☀️ fetching {}", url);

        let response = self.http.get(url).send().await.with_context(|| {
            format!(
                "💀 Solr at '{}' didn't pick up. Is the core running?",
                self.select_url
            )
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("💀 The Solr response body got lost on the way back")?;
        if !status.is_success() {
            bail!("💀 Solr answered with {status}: {body}");
        }
        serde_json::from_str(&body)
            .with_context(|| format!("💀 Solr sent something that isn't a select response: {body}"))
    }

    fn record_from(&mut self, raw: serde_json::Value) -> Option<DocumentRecord> {
        let extracted = SolrDocument::deserialize(&raw)
            .map_err(|err| err.to_string())
            .and_then(|doc| {
                extract_content(&doc, &self.field, None, false)
                    .map(|extracted| (doc, extracted))
                    .map_err(|err| err.to_string())
            });

        match extracted {
            Ok((doc, extracted)) => {
                let position = self.position;
                self.position += 1;
                let id = doc
                    .native_id()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}[{}]", extracted.field_path, position));
                self.stats.emitted += 1;
                Some(DocumentRecord::new(id, extracted.content))
            }
            Err(reason) => {
                self.stats.skipped += 1;
                if self.failure_log.try_spend() {
                    warn!("⚠️ Unable to process Solr doc ({}): {}", reason, raw);
                }
                None
            }
        }
    }
}

#[async_trait]
impl DocumentSource for SolrSource {
    async fn next_record(&mut self) -> Result<Option<DocumentRecord>> {
        loop {
            if let Some(raw) = self.page.next() {
                if let Some(record) = self.record_from(raw) {
                    return Ok(Some(record));
                }
                continue;
            }
            if self.done {
                return Ok(None);
            }
            if self
                .num_found
                .is_some_and(|num_found| self.next_start >= num_found)
            {
                trace!("🏁 Solr paging done at start={}", self.next_start);
                self.done = true;
                return Ok(None);
            }

            let response = self.fetch_page(self.next_start).await?;
            if self.num_found.is_none() {
                debug!(
                    "☀️ '{}' matched {} doc(s) for '{}'",
                    self.select_url, response.response.num_found, self.options.query
                );
            }
            self.num_found = Some(response.response.num_found);
            if response.response.docs.is_empty() {
                trace!("🏁 Solr returned an empty page at start={}", self.next_start);
                self.done = true;
                return Ok(None);
            }
            self.next_start += self.options.rows;
            self.page = response.response.docs.into_iter();
        }
    }

    fn stats(&self) -> SourceStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn the_one_where_pages_are_walked_until_num_found() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/solr/articles/select"))
            .and(query_param("start", "0"))
            .and(query_param("rows", "2"))
            .and(query_param("q", "*:*"))
            .and(query_param("wt", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"numFound": 3, "start": 0, "docs": [
                    {"id": "s1", "text": "one"},
                    {"id": "s2", "text": ["two", "lines"]}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/solr/articles/select"))
            .and(query_param("start", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"numFound": 3, "start": 2, "docs": [{"text": "three"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = SolrOptions {
            rows: 2,
            ..Default::default()
        };
        let mut source = SolrSource::new(&format!("{}/solr/articles", server.uri()), "text", &options)?;
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await? {
            records.push(record);
        }

        assert_eq!(
            records,
            vec![
                DocumentRecord::new("s1", "one"),
                DocumentRecord::new("s2", "two\nlines"),
                DocumentRecord::new("text[2]", "three"),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_docs_without_the_field_are_skipped() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/select"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"numFound": 2, "start": 0, "docs": [
                    {"id": "s1", "title": "no text"},
                    {"id": "s2", "text": "has text"}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut source = SolrSource::new(&server.uri(), "text", &SolrOptions::default())?;
        assert_eq!(source.next_record().await?, Some(DocumentRecord::new("s2", "has text")));
        assert!(source.next_record().await?.is_none());
        assert_eq!(source.stats().skipped, 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_http_error_is_fatal() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/select"))
            .respond_with(ResponseTemplate::new(500).set_body_string("core on fire"))
            .mount(&server)
            .await;

        let mut source = SolrSource::new(&server.uri(), "text", &SolrOptions::default())?;
        assert!(source.next_record().await.is_err());
        Ok(())
    }
}
