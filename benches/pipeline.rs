//! Performance benchmarks for a3s-disclosure
//!
//! Run with: cargo bench

use a3s_disclosure::{
    DisclosureConfig, DisclosurePipeline, Recognizer, Reconciler, Requester, TextIndex,
};
use criterion::{criterion_group, criterion_main, Criterion};

const CASE_TEXT: &str = "Anna Andersson (19811218-9876) kontaktade socialtjänsten 2024-03-15. \
Hon berättade att hennes sambo Lars Johansson har missbruksproblem och att familjen har \
skulder hos kronofogden. Anna nås på 070-123 45 67 eller anna.andersson@exempel.se.\n\n\
Handläggare Karin Berg bedömer att barnet Maja behöver stöd. Orosanmälan från skolan \
inkom den 15 januari 2025. Mormor Eva Lindström har erbjudit sig att hjälpa till.";

fn bench_recognize(c: &mut Criterion) {
    let config = DisclosureConfig::default();
    let recognizer = Recognizer::from_config(&config.recognizer);
    let reconciler = Reconciler::new(config.reconciler).unwrap();
    let index = TextIndex::new(CASE_TEXT);

    c.bench_function("Recognizer::recognize", |b| {
        b.iter(|| recognizer.recognize(&index).unwrap());
    });

    let candidates = recognizer.recognize(&index).unwrap();
    c.bench_function("Reconciler::reconcile", |b| {
        b.iter(|| reconciler.reconcile_indexed(candidates.clone(), &index));
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let pipeline = DisclosurePipeline::new(DisclosureConfig::default()).unwrap();
    let requester = Requester::public();

    c.bench_function("DisclosurePipeline::process (local)", |b| {
        b.to_async(&rt)
            .iter(|| async { pipeline.process(CASE_TEXT, &requester).await.unwrap() });
    });
}

fn bench_document_size(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let pipeline = DisclosurePipeline::new(DisclosureConfig::default()).unwrap();
    let requester = Requester::public();

    let mut group = c.benchmark_group("document_size");
    for copies in [1, 10, 50] {
        let text = vec![CASE_TEXT; copies].join("\n\n");
        group.bench_function(format!("{} copies", copies), |b| {
            b.to_async(&rt)
                .iter(|| async { pipeline.process(&text, &requester).await.unwrap() });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_recognize,
    bench_pipeline,
    bench_document_size,
);
criterion_main!(benches);
