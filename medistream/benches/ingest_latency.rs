// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

//! Ingestion latency benchmarks.
//!
//! Measures:
//! - Full normalization of short and long answers
//! - Framing a captured event stream, whole and in small chunks
//! - A complete session: framing + re-normalization on every token
//!
//! Run: cargo bench --bench ingest_latency

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use medistream::config::{RenormalizePolicy, SessionConfig};
use medistream::normalize::{MarkdownNormalizer, Normalizer};
use medistream::session::{AnswerObserver, FailureNotice, IngestionSession};
use medistream::stream::{FrameProtocol, Source, StreamFramer};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const MESSY_ANSWER: &str = "Type 2 Diabetes- Symptoms: frequent ur ination.- Fatigue \
**Treatment** ins ulin and -**Diet** - \n**low sugar**Summary- Management: \
strong ly recommended exercise for sedent ary patients.";

fn long_answer(sections: usize) -> String {
    (0..sections).map(|_| MESSY_ANSWER).collect::<Vec<_>>().join("\n")
}

/// Event-stream body carrying `answer` one word per frame.
fn wire_body(answer: &str) -> Vec<u8> {
    let mut body = String::new();
    for word in answer.split_inclusive(' ') {
        body.push_str("data: ");
        body.push_str(&serde_json::Value::String(word.to_string()).to_string());
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

struct Discard;

impl AnswerObserver for Discard {
    fn on_token(&mut self, normalized: &str) {
        black_box(normalized);
    }

    fn on_sources(&mut self, sources: &[Source]) {
        black_box(sources);
    }

    fn on_failure(&mut self, notice: &FailureNotice) {
        black_box(notice);
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_normalize(c: &mut Criterion) {
    let normalizer = MarkdownNormalizer::with_defaults();
    let mut group = c.benchmark_group("normalize");

    for sections in [1usize, 8, 64] {
        let input = long_answer(sections);
        group.bench_with_input(BenchmarkId::new("messy", sections), &input, |b, input| {
            b.iter(|| normalizer.normalize(black_box(input)))
        });
    }

    // Already normalized input should converge in a single round
    let normalized = normalizer.normalize(&long_answer(8));
    group.bench_function("already_normalized", |b| {
        b.iter(|| normalizer.normalize(black_box(&normalized)))
    });

    group.finish();
}

fn bench_framing(c: &mut Criterion) {
    let body = wire_body(&long_answer(8));
    let mut group = c.benchmark_group("framing");

    for chunk_size in [16usize, 256, body.len()] {
        group.bench_with_input(
            BenchmarkId::new("chunk_size", chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut framer = StreamFramer::new(FrameProtocol::default());
                    let mut events = 0;
                    for chunk in body.chunks(chunk_size) {
                        events += framer.push(black_box(chunk)).len();
                    }
                    events
                })
            },
        );
    }

    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let body = wire_body(&long_answer(2));
    let normalizer: Arc<dyn Normalizer> = Arc::new(MarkdownNormalizer::with_defaults());
    let mut group = c.benchmark_group("session");

    for policy in [RenormalizePolicy::EveryToken, RenormalizePolicy::LineBreak] {
        group.bench_function(format!("{policy:?}"), |b| {
            b.iter(|| {
                let mut session = IngestionSession::new(
                    "bench",
                    FrameProtocol::default(),
                    Arc::clone(&normalizer),
                    SessionConfig {
                        renormalize: policy,
                    },
                    Discard,
                );
                for chunk in body.chunks(64) {
                    session.ingest_chunk(chunk);
                }
                session.into_report()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_framing, bench_session);
criterion_main!(benches);
