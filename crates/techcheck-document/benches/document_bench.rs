// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the techcheck-document crate: layout extraction
// and page classification on the synthetic nine-page thesis.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use techcheck_core::config::ExtractionConfig;
use techcheck_document::{Extractor, PageClassifier, fixtures};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Extraction of the fixture thesis, parallel and sequential, so the rayon
/// overhead on short documents stays visible.
fn bench_extraction(c: &mut Criterion) {
    let bytes = fixtures::thesis_pdf();
    let parallel = Extractor::default();
    let sequential = Extractor::new(ExtractionConfig {
        parallel: false,
        ..ExtractionConfig::default()
    });

    c.bench_function("extract thesis (parallel)", |b| {
        b.iter(|| black_box(parallel.extract(black_box(&bytes))))
    });
    c.bench_function("extract thesis (sequential)", |b| {
        b.iter(|| black_box(sequential.extract(black_box(&bytes))))
    });
}

fn bench_classification(c: &mut Criterion) {
    let Ok(document) = Extractor::default().extract(&fixtures::thesis_pdf()) else {
        return;
    };
    let classifier = PageClassifier::default();

    c.bench_function("classify thesis", |b| {
        b.iter(|| black_box(classifier.classify(black_box(document.clone()))))
    });
}

criterion_group!(benches, bench_extraction, bench_classification);
criterion_main!(benches);
