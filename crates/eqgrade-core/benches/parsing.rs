use criterion::{black_box, criterion_group, criterion_main, Criterion};

use eqgrade_core::error::AnswerRole;
use eqgrade_core::extractor::parse_extraction_output;

fn bench_parse_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_extraction");

    let simple = r#"[{"equation": "F = ma", "description": "force equals mass times acceleration"}]"#;

    let fenced = format!("```json\n{simple}\n```");

    // raw newlines inside string literals take the escaping path
    let control_chars = "[{\"equation\": \"E = mc²\", \"description\": \"energy equals\nmass times c squared\"}]";

    let large = generate_records(200);

    group.bench_function("simple", |b| {
        b.iter(|| parse_extraction_output(black_box(simple), AnswerRole::Master))
    });

    group.bench_function("fenced", |b| {
        b.iter(|| parse_extraction_output(black_box(&fenced), AnswerRole::Master))
    });

    group.bench_function("control_chars", |b| {
        b.iter(|| parse_extraction_output(black_box(control_chars), AnswerRole::Student))
    });

    group.bench_function("200_records", |b| {
        b.iter(|| parse_extraction_output(black_box(&large), AnswerRole::Master))
    });

    group.finish();
}

fn generate_records(n: usize) -> String {
    let records: Vec<String> = (0..n)
        .map(|i| {
            format!(
                r#"{{"equation": "y_{i} = {i}x + {i}", "description": "y {i} equals {i} times x plus {i}"}}"#
            )
        })
        .collect();
    format!("[{}]", records.join(","))
}

criterion_group!(benches, bench_parse_extraction);
criterion_main!(benches);
