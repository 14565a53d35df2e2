//! 🏎️ How fast does the event scanner chew through a chat export?

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use inlet::json_events::JsonEventReader;
use tokio::runtime::Runtime;

fn chat_export(messages: usize) -> String {
    let body: Vec<String> = (0..messages)
        .map(|n| {
            format!(
                r#"{{"event": "message", "id": {n}, "tags": ["a", "b"], "content": "message number {n} with an \"escaped\" bit\n"}}"#
            )
        })
        .collect();
    format!("[{}]", body.join(",\n"))
}

fn bench_scanner(c: &mut Criterion) {
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => panic!("💀 no tokio runtime for the bench: {err}"),
    };
    let mut group = c.benchmark_group("json_events");

    for messages in [1_000usize, 10_000] {
        let document = chat_export(messages);
        group.throughput(Throughput::Bytes(document.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(messages), &document, |b, document| {
            b.to_async(&runtime).iter(|| async {
                let mut events = JsonEventReader::new(document.as_bytes());
                let mut count = 0u64;
                while let Ok(Some(_event)) = events.next_event().await {
                    count += 1;
                }
                count
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scanner);
criterion_main!(benches);
