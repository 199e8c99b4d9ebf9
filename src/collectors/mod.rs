//! Concrete collectors shipped with the crate
mod file;
mod fixed;

pub use self::file::{FileCollector, PATH_PARAM};
pub use self::fixed::{FixedCollector, DEFAULT_VALUE};

use crate::api::{Metric, MetricBuilder, MetricPath, MetricValue, Replacements};
use crate::collector::{MetricSpec, Target};
use crate::config::ExtensionConfig;
use crate::errors::MetricError;

/// Builds collected metrics at `prefix|<target>|<alias or name>`. Target names and metric names
/// often come from remote systems, so both pass through the configured replacements first.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricNamer {
    prefix: MetricPath,
    replacements: Replacements,
}

impl MetricNamer {
    pub fn new(prefix: MetricPath, replacements: Replacements) -> MetricNamer {
        MetricNamer {
            prefix,
            replacements,
        }
    }

    pub fn from_config(config: &ExtensionConfig) -> MetricNamer {
        MetricNamer::new(config.metric_prefix.clone(), config.replacements.clone())
    }

    pub fn prefix(&self) -> &MetricPath {
        &self.prefix
    }

    pub fn build(
        &self,
        target: &Target,
        spec: &MetricSpec,
        value: MetricValue,
    ) -> Result<Metric, MetricError> {
        let target_segment = self.replacements.apply(target.name())?;
        let leaf = self.replacements.apply(spec.display_name())?;
        let path = self
            .prefix
            .child(&*target_segment)?
            .child(&*leaf)?;

        MetricBuilder::new(leaf.into_owned(), spec.apply_multiplier(value))
            .path(path)
            .properties(&spec.properties)
            .build()
    }
}
