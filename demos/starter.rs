//! A starter extension: reports placeholder values for every configured server and metric,
//! a pair of cluster-level request counters, and a handful of metrics whose raw names need
//! character replacement. Metrics are printed to stdout in the agent's line format.
//!
//! Run with `cargo run --example starter`.
use async_trait::async_trait;
use extension_monitor::api::ClusterRollup;
use extension_monitor::{
    Collector, Collectors, ConfigItem, Extension, ExtensionConfig, ExtensionLoggerBuilder,
    ExtensionManager, FixedCollector, Metric, MetricBuilder, MetricNamer, MetricPath,
    MetricProperties, MetricSpec, Replacements, Target, WriterSink,
};
use std::error::Error;

/// Raw names as a remote system might hand them over
const CHARACTER_REPLACEMENT: &[&str] = &[
    "Pipe|",
    "Comma,",
    ":Colon",
    "Memory \u{dc}sed",
    "Question?Mark",
];

struct StarterCollector {
    fixed: FixedCollector,
    prefix: MetricPath,
    replacements: Replacements,
    /// Target that also reports the `Character Replacement` metrics, once per cycle
    showcase: Option<String>,
}

impl StarterCollector {
    fn new(config: &ExtensionConfig) -> StarterCollector {
        StarterCollector {
            fixed: FixedCollector::new(MetricNamer::from_config(config)),
            prefix: config.metric_prefix.clone(),
            replacements: config.replacements.clone(),
            showcase: config.targets.first().map(|t| t.name().to_owned()),
        }
    }

    /// `prefix|Master|<target>|Requests`, rolled up across the cluster
    fn cluster_metric(&self, target: &Target) -> Result<Metric, Box<dyn Error + Send + Sync>> {
        let node = self.replacements.apply(target.name())?;
        let path = self.prefix.child("Master")?.child(&*node)?.child("Requests")?;
        let props = MetricProperties {
            cluster_rollup: Some(ClusterRollup::Collective),
            ..Default::default()
        };
        Ok(MetricBuilder::new("Requests", 10)
            .path(path)
            .properties(&props)
            .build()?)
    }

    fn replaced_metrics(&self) -> Result<Vec<Metric>, Box<dyn Error + Send + Sync>> {
        let base = self.prefix.child("Character Replacement")?;
        let mut metrics = Vec::with_capacity(CHARACTER_REPLACEMENT.len());
        for raw in CHARACTER_REPLACEMENT {
            let name = self.replacements.apply(raw)?;
            metrics.push(MetricBuilder::new(&*name, 10).prefix(&base).build()?);
        }
        Ok(metrics)
    }
}

#[async_trait]
impl Collector for StarterCollector {
    fn name(&self) -> &str {
        "starter"
    }

    async fn fetch(
        &self,
        target: &Target,
        specs: &[MetricSpec],
    ) -> Result<Vec<Metric>, Box<dyn Error + Send + Sync>> {
        let mut metrics = self.fixed.fetch(target, specs).await?;
        metrics.push(self.cluster_metric(target)?);
        if self.showcase.as_deref() == Some(target.name()) {
            metrics.extend(self.replaced_metrics()?);
        }
        Ok(metrics)
    }
}

struct Starter;

impl ExtensionManager for Starter {
    fn name() -> &'static str {
        "extension-starter"
    }

    fn collectors(config: &ExtensionConfig) -> Result<Collectors, Box<dyn Error + Send + Sync>> {
        Ok(Collectors::single(StarterCollector::new(config)))
    }
}

fn config() -> Vec<ConfigItem> {
    let server = |name: &str| ConfigItem::new("Server").child(ConfigItem::with_value("Name", name));
    vec![
        ConfigItem::with_value("MetricPrefix", "Custom Metrics|Extension Starter|"),
        ConfigItem::with_value("NumberOfThreads", 4.0),
        ConfigItem::with_value("LogLevel", "INFO"),
        server("Node1"),
        server("Node2"),
        ConfigItem::new("Metric")
            .child(ConfigItem::with_value("Name", "CPU"))
            .child(
                ConfigItem::new("Properties")
                    .child(ConfigItem::with_value("Alias", "CPU Utilization"))
                    .child(ConfigItem::with_value("AggregationType", "AVERAGE"))
                    .child(ConfigItem::with_value("TimeRollUpType", "AVERAGE"))
                    .child(ConfigItem::with_value("ClusterRollUpType", "INDIVIDUAL")),
            ),
        ConfigItem::new("Metric").child(ConfigItem::with_value("Name", "Memory")),
    ]
}

fn main() -> Result<(), Box<dyn Error>> {
    let items = config();
    let level = ExtensionConfig::from_config(&items)?.log_level;
    ExtensionLoggerBuilder::new()
        .prefix_extension::<Starter>()
        .filter_level(level.to_level_filter())
        .try_init()?;

    let sink = Box::new(WriterSink::new(std::io::stdout()));
    let extension = Extension::new::<Starter>(&items, sink)?.on_complete(|completion| {
        log::info!(
            "completed task for {} servers, {} failed",
            completion.targets,
            completion.failed_targets.len()
        );
    });

    let completion = extension.execute();
    if let Some(e) = completion.error {
        return Err(Box::new(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_replacement_metrics_reported_once() {
        let config = ExtensionConfig::from_config(&config()).unwrap();
        let collector = StarterCollector::new(&config);

        let mut paths = Vec::new();
        for target in &config.targets {
            let metrics = collector.fetch(target, &config.metrics).await.unwrap();
            paths.extend(metrics.iter().map(|m| m.path().render()));
        }

        let unique: HashSet<&String> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
        let replaced = paths
            .iter()
            .filter(|p| p.contains("|Character Replacement|"))
            .count();
        assert_eq!(replaced, CHARACTER_REPLACEMENT.len());
    }
}
