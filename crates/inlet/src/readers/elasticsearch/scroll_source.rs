//! 📜 Full scroll through an index.
//!
//! First pull opens the scroll; each drained page asks for the next one with the
//! latest cursor. The scroll ends when the cluster stops sending a `_scroll_id` or a
//! page comes back empty, whichever happens first. On the way out the scroll context
//! is released. If that cleanup fails we grumble in the logs and carry on; the
//! context expires on its own after the keep-alive anyway.

use std::vec;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{ElasticClient, ElasticOptions, HitExtractor, SearchResponse};
use crate::common::{DocumentRecord, SourceStats};
use crate::readers::DocumentSource;

#[derive(Debug)]
struct Page {
    hits: vec::IntoIter<Value>,
    was_empty: bool,
    scroll_id: Option<String>,
}

impl From<SearchResponse> for Page {
    fn from(response: SearchResponse) -> Self {
        Self {
            was_empty: response.hits.hits.is_empty(),
            hits: response.hits.hits.into_iter(),
            scroll_id: response.scroll_id,
        }
    }
}

#[derive(Debug)]
enum ScrollState {
    NotStarted,
    Paging(Page),
    Done,
}

#[derive(Debug)]
pub struct ElasticScrollSource {
    client: ElasticClient,
    extractor: HitExtractor,
    scroll: String,
    page_size: usize,
    state: ScrollState,
    pages: u64,
    stats: SourceStats,
}

impl ElasticScrollSource {
    /// 🚀 Builds the client and extractor. The cluster hears nothing until the first pull.
    pub fn new(url: &str, content_field: &str, options: &ElasticOptions) -> Result<Self> {
        let client = ElasticClient::new(url, options)?;
        let extractor = HitExtractor::new(client.index(), content_field, options);
        Ok(Self {
            client,
            extractor,
            scroll: options.scroll.clone(),
            page_size: options.page_size,
            state: ScrollState::NotStarted,
            pages: 0,
            stats: SourceStats::default(),
        })
    }

    async fn release(&self, scroll_id: Option<String>) {
        let Some(scroll_id) = scroll_id else {
            return;
        };
        if let Err(err) = self.client.clear_scroll(&scroll_id).await {
            warn!("⚠️ Could not clear the scroll context, it will expire on its own: {err:#}");
        }
    }
}

#[async_trait]
impl DocumentSource for ElasticScrollSource {
    async fn next_record(&mut self) -> Result<Option<DocumentRecord>> {
        loop {
            match std::mem::replace(&mut self.state, ScrollState::Done) {
                ScrollState::Done => return Ok(None),
                ScrollState::NotStarted => {
                    let response = self.client.open_scroll(&self.scroll, self.page_size).await?;
                    self.pages += 1;
                    if response.scroll_id.is_none() {
                        debug!(
                            "📜 '{}' handed back no scroll cursor, nothing to scroll through",
                            self.client.index()
                        );
                        return Ok(None);
                    }
                    self.state = ScrollState::Paging(Page::from(response));
                }
                ScrollState::Paging(mut page) => {
                    if let Some(raw) = page.hits.next() {
                        let record = self.extractor.record_from(raw, &mut self.stats);
                        self.state = ScrollState::Paging(page);
                        if let Some(record) = record {
                            return Ok(Some(record));
                        }
                        continue;
                    }

                    if page.was_empty || page.scroll_id.is_none() {
                        trace!(
                            "🏁 scroll over '{}' finished after {} page(s)",
                            self.client.index(),
                            self.pages
                        );
                        self.release(page.scroll_id).await;
                        return Ok(None);
                    }

                    let Some(scroll_id) = page.scroll_id else {
                        return Ok(None);
                    };
                    let response = self.client.continue_scroll(&self.scroll, &scroll_id).await?;
                    self.pages += 1;
                    self.state = ScrollState::Paging(Page::from(response));
                }
            }
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
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> ElasticOptions {
        ElasticOptions {
            index: Some("articles".into()),
            page_size: 2,
            ..Default::default()
        }
    }

    async fn drain(source: &mut ElasticScrollSource) -> Result<Vec<DocumentRecord>> {
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    #[tokio::test]
    async fn the_one_where_two_pages_then_an_empty_one_ends_the_scroll() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/articles/_search"))
            .and(query_param("scroll", "5m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_scroll_id": "cursor-1",
                "hits": {"hits": [
                    {"_id": "a", "_source": {"text": "first"}},
                    {"_id": "b", "_source": {"text": "second"}}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/_search/scroll"))
            .and(body_partial_json(json!({"scroll_id": "cursor-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_scroll_id": "cursor-2",
                "hits": {"hits": [{"_id": "c", "_source": {"text": "third"}}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/_search/scroll"))
            .and(body_partial_json(json!({"scroll_id": "cursor-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_scroll_id": "cursor-3",
                "hits": {"hits": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/_search/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"succeeded": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut source = ElasticScrollSource::new(&server.uri(), "text", &options())?;
        let records = drain(&mut source).await?;

        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(records[2].id, "articles/text[2]");
        assert!(source.next_record().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_no_scroll_id_means_no_scroll() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/articles/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {"hits": [{"_id": "a", "_source": {"text": "ignored"}}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut source = ElasticScrollSource::new(&server.uri(), "text", &options())?;
        assert!(source.next_record().await?.is_none());
        assert!(source.next_record().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_failed_cleanup_is_only_a_warning() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/articles/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_scroll_id": "cursor-1",
                "hits": {"hits": []}
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/_search/scroll"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
            .mount(&server)
            .await;

        let mut source = ElasticScrollSource::new(&server.uri(), "text", &options())?;
        assert!(source.next_record().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_include_id_uses_the_hit_id_and_api_key_wins() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/articles/_search"))
            .and(wiremock::matchers::header("Authorization", "ApiKey sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_scroll_id": "cursor-1",
                "hits": {"hits": [
                    {"_id": "doc-1", "_source": {"text": "hello"}},
                    {"_id": "doc-2", "_source": {"nope": "skipped"}}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/_search/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": {"hits": []}})))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/_search/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let options = ElasticOptions {
            include_id: true,
            api_key: Some("sekrit".into()),
            username: Some("elastic".into()),
            password: Some("changeme".into()),
            ..options()
        };
        let mut source = ElasticScrollSource::new(&server.uri(), "text", &options)?;
        let records = drain(&mut source).await?;

        assert_eq!(records, vec![DocumentRecord::new("doc-1", "hello")]);
        assert_eq!(source.stats().skipped, 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_server_error_is_fatal() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/articles/_search"))
            .respond_with(ResponseTemplate::new(404).set_body_string("index_not_found_exception"))
            .mount(&server)
            .await;

        let mut source = ElasticScrollSource::new(&server.uri(), "text", &options())?;
        let err = source.next_record().await.expect_err("404 should be fatal");
        assert!(format!("{err:#}").contains("404"));
        Ok(())
    }
}
