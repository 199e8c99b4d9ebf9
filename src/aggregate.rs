use crate::api::{AggregationType, Metric, MetricBuilder, MetricPath, MetricValue, AGGREGATION_TYPE};
use crate::collector::CollectionResult;
use bitflags::bitflags;
use log::warn;
use std::collections::BTreeMap;

pub const CLUSTER_SEGMENT: &str = "Cluster";
pub const TARGETS_SEGMENT: &str = "Targets";
pub const HEALTHY_TARGETS: &str = "Healthy Targets";
pub const ERROR_COUNT: &str = "Error Count";
pub const TOTAL_SUFFIX: &str = "-total";

bitflags! {
    /// Bitflags of the derived metrics computed at the end of a cycle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Aggregations: u32 {
        /// `<name>-total` across every successful target
        const SUM =           0b0000_0001;

        /// Number of healthy and failed targets
        const TARGET_COUNTS = 0b0000_0010;
    }
}

impl Aggregations {
    pub fn has_sum(&self) -> bool {
        self.intersects(Aggregations::SUM)
    }

    pub fn has_target_counts(&self) -> bool {
        self.intersects(Aggregations::TARGET_COUNTS)
    }
}

impl Default for Aggregations {
    fn default() -> Self {
        Aggregations::all()
    }
}

/// Derives cluster-wide metrics from a cycle's results.
///
/// Aggregation is a pure function of its input: the same results, in any order, always yield
/// the same derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    aggregations: Aggregations,
    prefix: MetricPath,
}

impl Aggregator {
    pub fn new(aggregations: Aggregations, prefix: MetricPath) -> Aggregator {
        Aggregator {
            aggregations,
            prefix,
        }
    }

    pub fn aggregations(&self) -> Aggregations {
        self.aggregations
    }

    pub fn aggregate(&self, results: &[CollectionResult]) -> Vec<Metric> {
        let mut derived = Vec::new();
        if results.is_empty() {
            return derived;
        }

        if self.aggregations.has_sum() {
            self.sums(results, &mut derived);
        }

        if self.aggregations.has_target_counts() {
            self.target_counts(results, &mut derived);
        }

        derived
    }

    fn sums(&self, results: &[CollectionResult], out: &mut Vec<Metric>) {
        let mut by_name: BTreeMap<&str, Vec<&MetricValue>> = BTreeMap::new();
        for metric in results
            .iter()
            .filter(|r| r.is_success())
            .flat_map(|r| r.metrics())
            .filter(|m| m.value().is_numeric())
        {
            by_name.entry(metric.name()).or_default().push(metric.value());
        }

        for (name, values) in by_name {
            let total = format!("{}{}", name, TOTAL_SUFFIX);
            let built = self
                .prefix
                .child(CLUSTER_SEGMENT)
                .and_then(|p| p.child(total.as_str()))
                .and_then(|path| {
                    MetricBuilder::new(total.as_str(), sum(&values))
                        .path(path)
                        .property(AGGREGATION_TYPE, AggregationType::Sum.as_str())
                        .build()
                });
            push_or_warn(out, &total, built);
        }
    }

    fn target_counts(&self, results: &[CollectionResult], out: &mut Vec<Metric>) {
        let healthy = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - healthy;

        for &(name, count) in &[(HEALTHY_TARGETS, healthy), (ERROR_COUNT, failed)] {
            let built = self.prefix.child(TARGETS_SEGMENT).and_then(|prefix| {
                MetricBuilder::new(name, count as i64)
                    .prefix(&prefix)
                    .property(AGGREGATION_TYPE, AggregationType::Observation.as_str())
                    .build()
            });
            push_or_warn(out, name, built);
        }
    }
}

fn push_or_warn(
    out: &mut Vec<Metric>,
    name: &str,
    built: Result<Metric, crate::errors::MetricError>,
) {
    match built {
        Ok(metric) => out.push(metric),
        Err(e) => warn!("skipping derived metric {}: {}", name, e),
    }
}

/// Integers are summed exactly unless the total overflows. Otherwise values are summed as
/// floats in `total_cmp` order so that input order never changes the result.
fn sum(values: &[&MetricValue]) -> MetricValue {
    let exact = values.iter().try_fold(0i64, |acc, v| match **v {
        MetricValue::Integer(x) => acc.checked_add(x),
        _ => None,
    });

    if let Some(total) = exact {
        return MetricValue::Integer(total);
    }

    let mut floats: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    floats.sort_by(f64::total_cmp);
    MetricValue::Float(floats.iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Target;
    use crate::errors::CollectionError;

    fn prefix() -> MetricPath {
        MetricPath::new(vec!["App"]).unwrap()
    }

    fn success(target: &str, values: &[(&str, MetricValue)]) -> CollectionResult {
        let target = Target::new(target);
        let path = prefix().child(target.name()).unwrap();
        let metrics = values
            .iter()
            .map(|(name, value)| {
                MetricBuilder::new(*name, value.clone())
                    .prefix(&path)
                    .build()
                    .unwrap()
            })
            .collect();
        CollectionResult::success(target, metrics)
    }

    fn find<'a>(metrics: &'a [Metric], path: &str) -> Option<&'a MetricValue> {
        metrics
            .iter()
            .find(|m| m.path().render() == path)
            .map(|m| m.value())
    }

    #[test]
    fn test_sum_and_counts() {
        let results = vec![
            success("a", &[("CPU", MetricValue::Integer(50))]),
            success("b", &[("CPU", MetricValue::Integer(70))]),
            CollectionResult::failure(Target::new("c"), CollectionError::Cancelled),
        ];

        let derived = Aggregator::new(Aggregations::all(), prefix()).aggregate(&results);
        assert_eq!(derived.len(), 3);
        assert_eq!(
            find(&derived, "App|Cluster|CPU-total"),
            Some(&MetricValue::Integer(120))
        );
        assert_eq!(
            find(&derived, "App|Targets|Healthy Targets"),
            Some(&MetricValue::Integer(2))
        );
        assert_eq!(
            find(&derived, "App|Targets|Error Count"),
            Some(&MetricValue::Integer(1))
        );
    }

    #[test]
    fn test_disabled() {
        let results = vec![success("a", &[("CPU", MetricValue::Integer(50))])];
        let derived = Aggregator::new(Aggregations::empty(), prefix()).aggregate(&results);
        assert!(derived.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let derived = Aggregator::new(Aggregations::all(), prefix()).aggregate(&[]);
        assert!(derived.is_empty());
    }

    #[test]
    fn test_mixed_and_text_values() {
        let results = vec![
            success(
                "a",
                &[
                    ("Load", MetricValue::Integer(1)),
                    ("State", MetricValue::from("up")),
                ],
            ),
            success("b", &[("Load", MetricValue::Float(0.5))]),
        ];

        let derived = Aggregator::new(Aggregations::SUM, prefix()).aggregate(&results);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].name(), "Load-total");
        assert_eq!(derived[0].value(), &MetricValue::Float(1.5));
        assert_eq!(derived[0].property(AGGREGATION_TYPE), Some("SUM"));
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        let a = MetricValue::Integer(i64::MAX);
        let b = MetricValue::Integer(1);
        match sum(&[&a, &b]) {
            MetricValue::Float(x) => assert!(x > 9.2e18),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_flags_default() {
        let flags = Aggregations::default();
        assert!(flags.has_sum());
        assert!(flags.has_target_counts());
        assert!(!Aggregations::TARGET_COUNTS.has_sum());
    }
}
