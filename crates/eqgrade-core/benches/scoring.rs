use criterion::{black_box, criterion_group, criterion_main, Criterion};

use eqgrade_core::fusion::fuse;
use eqgrade_core::model::EquationRecord;
use eqgrade_core::normalizer::normalize;
use eqgrade_core::similarity::cosine_similarity;
use eqgrade_core::substitution::substitute;

fn record(raw: &str, description: &str) -> EquationRecord {
    EquationRecord {
        equation: normalize(raw),
        raw_equation: raw.into(),
        description: description.into(),
    }
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    group.bench_function("short", |b| b.iter(|| normalize(black_box("E = mc²"))));

    group.bench_function("long", |b| {
        let long = "a² + b² = c² ".repeat(40);
        b.iter(|| normalize(black_box(&long)))
    });

    group.finish();
}

fn bench_substitute(c: &mut Criterion) {
    let mut group = c.benchmark_group("substitute");

    let text = "By Newton, F = ma. Energy is E = mc². For a right triangle a² + b² = c². \
                Momentum p = mv is conserved, and v = u + at holds under constant acceleration."
        .repeat(4);
    let one = vec![record("F = ma", "force equals mass times acceleration")];
    let many = vec![
        record("F = ma", "force equals mass times acceleration"),
        record("E = mc²", "energy equals mass times the speed of light squared"),
        record("a² + b² = c²", "the sum of the squares of the legs equals the square of the hypotenuse"),
        record("p = mv", "momentum equals mass times velocity"),
        record("v = u + at", "final velocity equals initial velocity plus acceleration times time"),
    ];

    group.bench_function("1_equation", |b| {
        b.iter(|| substitute(black_box(&text), black_box(&one)))
    });

    group.bench_function("5_equations", |b| {
        b.iter(|| substitute(black_box(&text), black_box(&many)))
    });

    group.finish();
}

fn bench_fuse(c: &mut Criterion) {
    c.bench_function("fuse", |b| {
        b.iter(|| fuse(black_box(0.6667), black_box(0.9123), black_box(0.8876)))
    });
}

fn bench_cosine(c: &mut Criterion) {
    let mut group = c.benchmark_group("cosine_similarity");

    for dim in [384usize, 768, 1024] {
        let a: Vec<f32> = (0..dim).map(|i| (i as f32).sin()).collect();
        let v: Vec<f32> = (0..dim).map(|i| (i as f32).cos()).collect();
        group.bench_function(format!("dim={dim}"), |b| {
            b.iter(|| cosine_similarity(black_box(&a), black_box(&v)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_substitute, bench_fuse, bench_cosine);
criterion_main!(benches);
