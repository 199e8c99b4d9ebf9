use criterion::{criterion_group, criterion_main, Criterion};
use extension_monitor::{
    Aggregations, Aggregator, CollectionError, CollectionResult, MetricBuilder, MetricPath,
    MetricValue, Replacements, Target,
};
use std::time::Duration;

fn results(targets: usize, metrics: usize) -> Vec<CollectionResult> {
    let prefix = MetricPath::new(vec!["Custom Metrics", "Extension Starter"]).unwrap();
    (0..targets)
        .map(|t| {
            let target = Target::new(format!("node-{}", t));
            if t % 10 == 9 {
                return CollectionResult::failure(
                    target,
                    CollectionError::Timeout(Duration::from_secs(30)),
                );
            }

            let path = prefix.child(target.name()).unwrap();
            let values = (0..metrics)
                .map(|m| {
                    let value = if m % 2 == 0 {
                        MetricValue::Integer((t * m) as i64)
                    } else {
                        MetricValue::Float(t as f64 / (m as f64 + 1.0))
                    };
                    MetricBuilder::new(format!("metric-{}", m), value)
                        .prefix(&path)
                        .build()
                        .unwrap()
                })
                .collect();
            CollectionResult::success(target, values)
        })
        .collect()
}

fn aggregate(c: &mut Criterion) {
    let prefix = MetricPath::new(vec!["Custom Metrics", "Extension Starter"]).unwrap();
    let aggregator = Aggregator::new(Aggregations::all(), prefix);

    let mut group = c.benchmark_group("aggregate");
    for &(targets, metrics) in &[(10, 10), (200, 20)] {
        let input = results(targets, metrics);
        group.bench_function(format!("{}x{}", targets, metrics), |b| {
            b.iter(|| aggregator.aggregate(&input))
        });
    }
    group.finish();
}

fn render_path(c: &mut Criterion) {
    let path =
        MetricPath::new(vec!["Custom Metrics", "Extension Starter", "Node1", "Requests"]).unwrap();
    let mut group = c.benchmark_group("render_path");
    group.bench_function("render", |b| b.iter(|| path.render()));
    group.bench_function("display", |b| b.iter(|| path.to_string()));
    group.finish();
}

fn replacements(c: &mut Criterion) {
    let rules = Replacements::defaults('|');
    let mut group = c.benchmark_group("replacements");
    group.bench_function("untouched", |b| b.iter(|| rules.apply("Requests per Minute")));
    group.bench_function("replaced", |b| b.iter(|| rules.apply("db:5432|pool,main")));
    group.finish();
}

criterion_group!(benches, aggregate, render_path, replacements);
criterion_main!(benches);
