//! Typed extension configuration. A configuration looks like:
//!
//! ```text
//! MetricPrefix "Custom Metrics|Extension Starter"
//! NumberOfThreads 4
//! TargetTimeout 10
//! <Server>
//!     Name "Node1"
//!     Type "file"
//!     <Connection>
//!         Path "/var/run/node1.metrics"
//!     </Connection>
//! </Server>
//! <Metric>
//!     Name "CPU"
//!     <Properties>
//!         Alias "CPU Utilization"
//!         AggregationType "AVERAGE"
//!     </Properties>
//! </Metric>
//! ```
use crate::aggregate::Aggregations;
use crate::api::{
    contains_separator, ConfigItem, LogLevel, MetricPath, MetricProperties, Replacement,
    Replacements, DEFAULT_SEPARATOR,
};
use crate::collector::{MetricSpec, Target};
use crate::de;
use crate::dispatch::{DispatchOptions, DEFAULT_TARGET_TIMEOUT};
use crate::errors::{ConfigError, MetricError};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

pub const DEFAULT_METRIC_PREFIX: &str = "Custom Metrics|Extension Starter";

#[derive(Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
#[serde(deny_unknown_fields)]
struct RawConfig {
    metric_prefix: Option<String>,
    separator: Option<char>,

    #[serde(default, rename = "Server")]
    servers: Vec<RawServer>,

    #[serde(default, rename = "Metric")]
    metrics: Vec<RawMetric>,

    number_of_threads: Option<usize>,
    target_timeout: Option<f64>,
    cycle_deadline: Option<f64>,
    derived_sums: Option<bool>,
    target_counts: Option<bool>,

    #[serde(rename = "Replacement")]
    replacements: Option<Vec<Replacement>>,

    log_level: Option<LogLevel>,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
#[serde(deny_unknown_fields)]
struct RawServer {
    name: String,

    #[serde(rename = "Type")]
    kind: Option<String>,

    #[serde(default)]
    connection: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
#[serde(deny_unknown_fields)]
struct RawMetric {
    name: String,

    #[serde(default)]
    properties: MetricProperties,
}

/// Validated configuration, populated once at load time
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionConfig {
    /// Every reported metric path starts here
    pub metric_prefix: MetricPath,
    pub targets: Vec<Target>,
    pub metrics: Vec<MetricSpec>,
    pub dispatch: DispatchOptions,
    pub aggregations: Aggregations,

    /// Applied to names that come from remote systems
    pub replacements: Replacements,
    pub log_level: LogLevel,
}

impl ExtensionConfig {
    pub fn from_config(items: &[ConfigItem]) -> Result<ExtensionConfig, ConfigError> {
        let raw: RawConfig =
            de::from_config(items).map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        raw.validate()
    }

    pub fn separator(&self) -> char {
        self.metric_prefix.separator()
    }
}

fn seconds(key: &'static str, value: Option<f64>) -> Result<Option<Duration>, ConfigError> {
    let invalid = |x: f64| ConfigError::InvalidValue {
        key,
        value: x.to_string(),
    };

    match value {
        None => Ok(None),
        Some(x) if x.is_finite() && x > 0.0 => Duration::try_from_secs_f64(x)
            .map(Some)
            .map_err(|_| invalid(x)),
        Some(x) => Err(invalid(x)),
    }
}

fn reject_separator(value: &str, separator: char) -> Result<(), ConfigError> {
    if contains_separator(value, separator) {
        Err(ConfigError::Metric(MetricError::ReservedCharacter {
            value: value.to_owned(),
            separator,
        }))
    } else {
        Ok(())
    }
}

impl RawConfig {
    fn validate(self) -> Result<ExtensionConfig, ConfigError> {
        let separator = self.separator.unwrap_or(DEFAULT_SEPARATOR);
        if separator.is_whitespace() {
            return Err(ConfigError::InvalidValue {
                key: "Separator",
                value: separator.to_string(),
            });
        }

        // Agent configurations traditionally end the prefix with a separator
        let prefix = self
            .metric_prefix
            .as_deref()
            .unwrap_or(DEFAULT_METRIC_PREFIX);
        let prefix = prefix.strip_suffix(separator).unwrap_or(prefix);
        let metric_prefix = MetricPath::parse(prefix, separator)?;

        let targets = validate_servers(self.servers)?;
        let metrics = validate_metrics(self.metrics, separator)?;

        let concurrency = match self.number_of_threads {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "NumberOfThreads",
                    value: String::from("0"),
                })
            }
            threads => threads,
        };

        let dispatch = DispatchOptions {
            concurrency,
            target_timeout: seconds("TargetTimeout", self.target_timeout)?
                .unwrap_or(DEFAULT_TARGET_TIMEOUT),
            cycle_deadline: seconds("CycleDeadline", self.cycle_deadline)?,
        };

        let mut aggregations = Aggregations::empty();
        aggregations.set(Aggregations::SUM, self.derived_sums.unwrap_or(true));
        aggregations.set(
            Aggregations::TARGET_COUNTS,
            self.target_counts.unwrap_or(true),
        );

        let replacements = match self.replacements {
            None => Replacements::defaults(separator),
            Some(rules) => {
                for rule in &rules {
                    if rule.replace.is_empty() {
                        return Err(ConfigError::EmptyName("Replacement"));
                    }
                    if contains_separator(&rule.replace_with, separator) {
                        return Err(ConfigError::InvalidValue {
                            key: "ReplaceWith",
                            value: rule.replace_with.clone(),
                        });
                    }
                }
                Replacements::new(separator, rules)
            }
        };

        Ok(ExtensionConfig {
            metric_prefix,
            targets,
            metrics,
            dispatch,
            aggregations,
            replacements,
            log_level: self.log_level.unwrap_or_default(),
        })
    }
}

fn validate_servers(servers: Vec<RawServer>) -> Result<Vec<Target>, ConfigError> {
    if servers.is_empty() {
        return Err(ConfigError::MissingTargets);
    }

    let mut seen = BTreeSet::new();
    let mut targets = Vec::with_capacity(servers.len());
    for server in servers {
        let name = server.name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyName("Server"));
        }

        if !seen.insert(name.to_owned()) {
            return Err(ConfigError::DuplicateTarget(name.to_owned()));
        }

        let mut target = Target::new(name);
        if let Some(kind) = server.kind {
            target = target.with_kind(kind);
        }
        for (key, value) in server.connection {
            target = target.with_param(key, value);
        }
        targets.push(target);
    }

    Ok(targets)
}

fn validate_metrics(metrics: Vec<RawMetric>, separator: char) -> Result<Vec<MetricSpec>, ConfigError> {
    if metrics.is_empty() {
        return Err(ConfigError::MissingMetrics);
    }

    let mut specs = Vec::with_capacity(metrics.len());
    for metric in metrics {
        if metric.name.trim().is_empty() {
            return Err(ConfigError::EmptyName("Metric"));
        }
        reject_separator(&metric.name, separator)?;

        if let Some(ref alias) = metric.properties.alias {
            if alias.trim().is_empty() {
                return Err(ConfigError::EmptyName("Alias"));
            }
            reject_separator(alias, separator)?;
        }

        if let Some(x) = metric.properties.multiplier {
            if !x.is_finite() {
                return Err(ConfigError::InvalidValue {
                    key: "Multiplier",
                    value: x.to_string(),
                });
            }
        }

        specs.push(MetricSpec::new(metric.name).with_properties(metric.properties));
    }

    Ok(specs)
}
