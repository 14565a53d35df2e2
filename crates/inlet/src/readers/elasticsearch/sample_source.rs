//! 🎲 Random sample of an index, with replacement.
//!
//! One `_count` up front, then independent windows: pick an end offset uniformly in
//! `[0, total]`, read the `batch_size` documents just before it. Whole batches are
//! yielded until at least `n_samples` documents have come out, so the last batch may
//! overshoot. The same document can show up more than once. That's sampling with
//! replacement, not a bug.
//!
//! 📐 Drawing the end rather than the start keeps every window inside the index, but it
//! isn't uniform per document. A document at position `i` is covered by `batch_size`
//! possible end offsets, except in the last `batch_size` positions, where only
//! `total - i` ends reach it. So the tail of the index turns up less often, down to
//! `1 / batch_size` of the usual rate for the very last document. Windows near the
//! start are clamped and shrink, so the head isn't favoured, it just comes in smaller
//! batches.
//!
//! ⚠️ Elasticsearch refuses `from + size` beyond `index.max_result_window` (10 000 by
//! default). Sampling a bigger index means raising that setting on the cluster.

use std::vec;

use anyhow::{Result, bail};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{ElasticClient, ElasticOptions, HitExtractor, SampleOptions};
use crate::common::{DocumentRecord, SourceStats};
use crate::readers::DocumentSource;

/// How many batches in a row may come back with nothing usable before we stop asking.
const MAX_BARREN_BATCHES: u32 = 10;

/// 🪟 One `from`/`size` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    pub offset: u64,
    pub size: u64,
}

impl SampleWindow {
    /// Draws a non-empty window inside `[0, total)`. `total` and `batch_size` must be > 0.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, total: u64, batch_size: u64) -> Self {
        loop {
            let end = rng.gen_range(0..=total);
            let window = match end.checked_sub(batch_size) {
                Some(offset) => Self {
                    offset,
                    size: batch_size,
                },
                // -- window pokes out before the first document: clamp and shrink
                None => Self { offset: 0, size: end },
            };
            if window.size > 0 {
                return window;
            }
        }
    }
}

#[derive(Debug)]
pub struct ElasticSampleSource {
    client: ElasticClient,
    extractor: HitExtractor,
    sample: SampleOptions,
    rng: StdRng,
    total: Option<u64>,
    batch: vec::IntoIter<Value>,
    emitted_in_batch: u64,
    barren_batches: u32,
    batches: u64,
    sampled: u64,
    done: bool,
    stats: SourceStats,
}

impl ElasticSampleSource {
    /// 🚀 Validates the knobs and seeds the dice. No requests yet.
    pub fn new(url: &str, content_field: &str, options: &ElasticOptions) -> Result<Self> {
        let sample = options.sample.clone().unwrap_or_default();
        if sample.batch_size == 0 {
            bail!("💀 A sample batch_size of 0 would sample nothing, forever. Pick something positive.");
        }
        let client = ElasticClient::new(url, options)?;
        let extractor = HitExtractor::new(client.index(), content_field, options);
        let rng = match sample.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            client,
            extractor,
            sample,
            rng,
            total: None,
            batch: Vec::new().into_iter(),
            emitted_in_batch: 0,
            barren_batches: 0,
            batches: 0,
            sampled: 0,
            done: false,
            stats: SourceStats::default(),
        })
    }

    async fn total(&mut self) -> Result<u64> {
        if let Some(total) = self.total {
            return Ok(total);
        }
        let total = self.client.count().await?;
        debug!("🔢 '{}' holds {} document(s)", self.client.index(), total);
        self.total = Some(total);
        Ok(total)
    }

    fn finish(&mut self) -> Result<Option<DocumentRecord>> {
        trace!(
            "🏁 sampled {} document(s) from '{}' in {} batch(es)",
            self.sampled,
            self.client.index(),
            self.batches
        );
        self.done = true;
        Ok(None)
    }
}

#[async_trait]
impl DocumentSource for ElasticSampleSource {
    async fn next_record(&mut self) -> Result<Option<DocumentRecord>> {
        loop {
            if let Some(raw) = self.batch.next() {
                if let Some(record) = self.extractor.record_from(raw, &mut self.stats) {
                    self.sampled += 1;
                    self.emitted_in_batch += 1;
                    return Ok(Some(record));
                }
                continue;
            }
            if self.done {
                return Ok(None);
            }

            if self.batches > 0 {
                if self.emitted_in_batch == 0 {
                    self.barren_batches += 1;
                } else {
                    self.barren_batches = 0;
                }
            }
            if self.sampled >= self.sample.n_samples {
                return self.finish();
            }
            if self.barren_batches >= MAX_BARREN_BATCHES {
                warn!(
                    "⚠️ {} sample batches in a row from '{}' came back with nothing usable, giving up",
                    self.barren_batches,
                    self.client.index()
                );
                return self.finish();
            }

            let total = self.total().await?;
            if total == 0 {
                warn!("⚠️ '{}' is empty, there is nothing to sample", self.client.index());
                return self.finish();
            }

            let window = SampleWindow::draw(&mut self.rng, total, self.sample.batch_size);
            trace!("🎲 sampling window {:?} of {}", window, total);
            let response = self.client.search_window(window.offset, window.size).await?;
            self.batches += 1;
            self.emitted_in_batch = 0;
            self.batch = response.hits.hits.into_iter();
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
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(batch_size: u64, n_samples: u64) -> ElasticOptions {
        ElasticOptions {
            index: Some("articles".into()),
            sample: Some(SampleOptions {
                batch_size,
                n_samples,
                seed: Some(7),
            }),
            ..Default::default()
        }
    }

    fn batch_of(n: usize) -> Value {
        let hits: Vec<Value> = (0..n)
            .map(|i| json!({"_id": format!("d{i}"), "_source": {"text": format!("doc {i}")}}))
            .collect();
        json!({"hits": {"hits": hits}})
    }

    #[test]
    fn the_one_where_windows_always_fit_inside_the_index() {
        let mut rng = StdRng::seed_from_u64(42);
        for (total, batch_size) in [(1_u64, 400_u64), (10, 4), (1000, 400), (400, 400)] {
            for _ in 0..500 {
                let window = SampleWindow::draw(&mut rng, total, batch_size);
                assert!(window.size > 0);
                assert!(window.size <= batch_size);
                assert!(window.offset + window.size <= total);
            }
        }
    }

    #[test]
    fn the_one_where_the_tail_of_the_index_is_drawn_less_often() {
        let (total, batch_size) = (20_u64, 5_u64);
        let mut rng = StdRng::seed_from_u64(7);
        let mut hits = vec![0_u32; total as usize];
        for _ in 0..20_000 {
            let window = SampleWindow::draw(&mut rng, total, batch_size);
            for position in window.offset..window.offset + window.size {
                hits[position as usize] += 1;
            }
        }
        // -- ~5/20 of draws cover a middle document, only ~1/20 reach the last one
        assert!(hits[19] * 2 < hits[10], "hits: {hits:?}");
        assert!(hits[0] > hits[19]);
    }

    #[test]
    fn the_one_where_the_same_seed_draws_the_same_windows() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(SampleWindow::draw(&mut a, 5000, 400), SampleWindow::draw(&mut b, 5000, 400));
        }
    }

    #[tokio::test]
    async fn the_one_where_whole_batches_come_out_until_enough_are_sampled() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/articles/_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1000})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/articles/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(batch_of(4)))
            .expect(3)
            .mount(&server)
            .await;

        let mut source = ElasticSampleSource::new(&server.uri(), "text", &options(4, 10))?;
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await? {
            records.push(record);
        }

        assert_eq!(records.len(), 12);
        assert_eq!(records[0].id, "articles/text[0]");
        assert_eq!(records[11].id, "articles/text[11]");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_empty_index_ends_the_sample_politely() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/articles/_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/articles/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(batch_of(1)))
            .expect(0)
            .mount(&server)
            .await;

        let mut source = ElasticSampleSource::new(&server.uri(), "text", &options(4, 10))?;
        assert!(source.next_record().await?.is_none());
        assert!(source.next_record().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_barren_batches_eventually_stop_the_dice() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/articles/_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 100})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/articles/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": {"hits": []}})))
            .expect(u64::from(MAX_BARREN_BATCHES))
            .mount(&server)
            .await;

        let mut source = ElasticSampleSource::new(&server.uri(), "text", &options(4, 10))?;
        assert!(source.next_record().await?.is_none());
        Ok(())
    }

    #[test]
    fn the_one_where_a_zero_batch_size_is_refused() {
        assert!(ElasticSampleSource::new("localhost:9200", "text", &options(0, 10)).is_err());
    }
}
