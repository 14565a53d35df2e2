//! 📊 progress.rs — "Are we there yet?" For a source of unknown length, the honest answer
//! is "we've seen this many documents, at this rate."
//!
//! A spinner on stderr while the run drains, and a comfy-table summary when it's done.
//! No percent, no ETA: a scroll through an index or a walk through a folder doesn't
//! announce its size up front.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::common::SourceStats;

const RATE_WINDOW: Duration = Duration::from_secs(5);

/// 🔢 "1000000" → "1,000,000".
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS for the long hauls.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

fn right(text: impl Into<String>) -> Cell {
    Cell::new(text.into()).set_alignment(CellAlignment::Right)
}

/// 📊 Live document counter with a 5-second sliding rate.
pub(crate) struct ProgressMetrics {
    source_name: String,
    total_docs: u64,
    progress_bar: ProgressBar,
    rate_samples: VecDeque<(Instant, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_docs", &self.total_docs)
            .finish()
    }
}

impl ProgressMetrics {
    /// `visible = false` gives a hidden bar: counts still tick, nothing is drawn.
    pub(crate) fn new(source_name: String, visible: bool) -> Self {
        let progress_bar = if visible {
            let bar = ProgressBar::new_spinner();
            // -- template is a literal; a parse failure falls back to the default spinner
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64));

        Self {
            source_name,
            total_docs: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    pub(crate) fn update(&mut self, docs: u64) {
        self.total_docs += docs;
        let rate = self.docs_per_sec();
        self.progress_bar.set_message(format!(
            "source: {} | {} Docs | {} Docs/s | {} elapsed",
            self.source_name,
            format_number(self.total_docs),
            format_number(rate as u64),
            format_duration(self.start_time.elapsed())
        ));
    }

    pub(crate) fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn docs_per_sec(&mut self) -> f64 {
        let now = Instant::now();
        while let Some(&(timestamp, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > RATE_WINDOW {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, self.total_docs));

        match self.rate_samples.front() {
            Some(&(oldest_time, oldest_docs)) => {
                let elapsed = now.duration_since(oldest_time).as_secs_f64();
                if elapsed > 0.0 {
                    self.total_docs.saturating_sub(oldest_docs) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }
}

/// 🍽️ The end-of-run table: borderless, two columns, right-aligned numbers.
pub(crate) fn summary_table(
    source: &str,
    reader: &str,
    stats: SourceStats,
    written: u64,
    elapsed: Duration,
) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let docs_per_sec = if elapsed.as_secs_f64() > 0.0 {
        written as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    table.add_row(vec![Cell::new("source"), Cell::new(source)]);
    table.add_row(vec![Cell::new("reader"), Cell::new(reader)]);
    table.add_row(vec![Cell::new("written"), right(format_number(written))]);
    table.add_row(vec![Cell::new("emitted"), right(format_number(stats.emitted))]);
    table.add_row(vec![Cell::new("skipped"), right(format_number(stats.skipped))]);
    table.add_row(vec![Cell::new("dropped"), right(format_number(stats.dropped))]);
    table.add_row(vec![Cell::new("elapsed"), right(format_duration(elapsed))]);
    table.add_row(vec![
        Cell::new("rate"),
        right(format!("{} Docs/s", format_number(docs_per_sec as u64))),
    ]);
    table
}
