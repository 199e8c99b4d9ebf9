use super::MetricNamer;
use crate::api::{Metric, MetricValue};
use crate::collector::{Collector, MetricSpec, Target};
use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::error::Error;

/// Value reported for any metric without a configured value
pub const DEFAULT_VALUE: i64 = 20;

/// Reports fixed values for every requested metric without contacting the target. Useful as a
/// starting point for a new extension and as a stand-in while wiring up a host.
#[derive(Debug, Clone)]
pub struct FixedCollector {
    namer: MetricNamer,
    values: BTreeMap<String, MetricValue>,
    default: MetricValue,
}

impl FixedCollector {
    pub fn new(namer: MetricNamer) -> FixedCollector {
        FixedCollector {
            namer,
            values: BTreeMap::new(),
            default: MetricValue::Integer(DEFAULT_VALUE),
        }
    }

    pub fn with_default<V: Into<MetricValue>>(mut self, value: V) -> FixedCollector {
        self.default = value.into();
        self
    }

    /// Reports `value` for the metric called `name` (matched before aliasing)
    pub fn with_value<N: Into<String>, V: Into<MetricValue>>(
        mut self,
        name: N,
        value: V,
    ) -> FixedCollector {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl Collector for FixedCollector {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch(
        &self,
        target: &Target,
        specs: &[MetricSpec],
    ) -> Result<Vec<Metric>, Box<dyn Error + Send + Sync>> {
        let mut metrics = Vec::with_capacity(specs.len());
        for spec in specs {
            let value = self
                .values
                .get(&spec.name)
                .cloned()
                .unwrap_or_else(|| self.default.clone());
            debug!("building metric {} for {}", spec.name, target.name());
            metrics.push(self.namer.build(target, spec, value)?);
        }

        Ok(metrics)
    }
}
