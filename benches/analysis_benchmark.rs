use algoviz_rs::analysis::{BehaviorAnalyzer, DpReconstructor, GenericAnalyzer};
use algoviz_rs::cli::analyze::detect_patterns;
use algoviz_rs::trace::Mapping;
use algoviz_rs::{Trace, TraceBuilder, Value};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Bottom-up fill of an `n`-cell table with a loop counter alongside
fn dp_fill(n: usize) -> Trace {
    let source = "dp[i] = dp[i-1] + dp[i-2]";
    let mut dp: Vec<i64> = vec![0; n];
    dp[0] = 1;
    dp[1] = 1;
    let mut builder = TraceBuilder::new().call("fill", [("n", n as i64)]);
    for i in 2..n {
        let mut snapshot = Mapping::new();
        snapshot.insert("i".into(), Value::Integer(i as i64));
        snapshot.insert("dp".into(), Value::from(dp.clone()));
        let next = dp[i - 1].wrapping_add(dp[i - 2]);
        builder = builder
            .at_line(4)
            .change("i", i as i64 - 1, i as i64)
            .at_line(5)
            .indexed_change("dp", i as i64, 0, next, snapshot, source);
        dp[i] = next;
    }
    builder.ret(dp[n - 1]).build()
}

fn analysis_benchmark(c: &mut Criterion) {
    let trace = dp_fill(200);

    c.bench_function("detect_patterns", |b| {
        b.iter(|| black_box(detect_patterns(black_box(&trace))));
    });
    c.bench_function("generic_analysis", |b| {
        b.iter(|| black_box(GenericAnalyzer::analyze(black_box(&trace))));
    });
    c.bench_function("behavior_reconstruction", |b| {
        b.iter(|| black_box(BehaviorAnalyzer::analyze(black_box(&trace))));
    });
    c.bench_function("dp_reconstruction", |b| {
        b.iter(|| black_box(DpReconstructor::analyze(black_box(&trace))));
    });
}

criterion_group!(benches, analysis_benchmark);
criterion_main!(benches);
