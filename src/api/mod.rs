use crate::errors::MetricError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

pub use self::config_item::{ConfigItem, ConfigValue};
pub use self::logger::{
    ExtensionLogger, ExtensionLoggerBuilder, LogLevel, LogTarget, ParseLevelError, StderrTarget,
};
pub use self::path::{MetricPath, Replacement, Replacements};

mod config_item;
mod logger;
mod path;

pub(crate) use self::path::contains_separator;

/// Separator between metric path segments unless configured otherwise
pub const DEFAULT_SEPARATOR: char = '|';

/// Property keys attached to metrics that carry rollup hints
pub const AGGREGATION_TYPE: &str = "AggregationType";
pub const TIME_ROLLUP_TYPE: &str = "TimeRollUpType";
pub const CLUSTER_ROLLUP_TYPE: &str = "ClusterRollUpType";

/// The value that a collector reports. Monitoring backends accept numbers, but some sources
/// only expose text (versions, states), which travels through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            MetricValue::Integer(x) => Some(x as f64),
            MetricValue::Float(x) => Some(x),
            MetricValue::Text(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Parses raw text read from a source: integers first, then floats, else text
    pub fn parse(raw: &str) -> MetricValue {
        let raw = raw.trim();
        if let Ok(x) = raw.parse::<i64>() {
            MetricValue::Integer(x)
        } else if let Ok(x) = raw.parse::<f64>() {
            MetricValue::Float(x)
        } else {
            MetricValue::Text(raw.to_owned())
        }
    }

    /// Scales a numeric value. Integers stay integers when the factor is integral.
    pub fn scale(&self, factor: f64) -> MetricValue {
        match *self {
            MetricValue::Integer(x) if factor.fract() == 0.0 => {
                let scaled = x as f64 * factor;
                if scaled.abs() < i64::MAX as f64 {
                    MetricValue::Integer(scaled as i64)
                } else {
                    MetricValue::Float(scaled)
                }
            }
            MetricValue::Integer(x) => MetricValue::Float(x as f64 * factor),
            MetricValue::Float(x) => MetricValue::Float(x * factor),
            MetricValue::Text(ref s) => MetricValue::Text(s.clone()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Integer(x) => write!(f, "{}", x),
            MetricValue::Float(x) => write!(f, "{}", x),
            MetricValue::Text(ref s) => f.write_str(s),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(x: i64) -> Self {
        MetricValue::Integer(x)
    }
}

impl From<i32> for MetricValue {
    fn from(x: i32) -> Self {
        MetricValue::Integer(i64::from(x))
    }
}

impl From<u32> for MetricValue {
    fn from(x: u32) -> Self {
        MetricValue::Integer(i64::from(x))
    }
}

impl From<f64> for MetricValue {
    fn from(x: f64) -> Self {
        MetricValue::Float(x)
    }
}

impl From<&str> for MetricValue {
    fn from(x: &str) -> Self {
        MetricValue::Text(x.to_owned())
    }
}

impl From<String> for MetricValue {
    fn from(x: String) -> Self {
        MetricValue::Text(x)
    }
}

/// How the backend aggregates values reported within one minute
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationType {
    Average,
    Sum,
    Observation,
}

/// How the backend rolls values up over longer time ranges
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeRollup {
    Average,
    Sum,
    Current,
}

/// How the backend combines values reported by several nodes of a tier
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterRollup {
    Individual,
    Collective,
}

impl AggregationType {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationType::Average => "AVERAGE",
            AggregationType::Sum => "SUM",
            AggregationType::Observation => "OBSERVATION",
        }
    }
}

impl TimeRollup {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRollup::Average => "AVERAGE",
            TimeRollup::Sum => "SUM",
            TimeRollup::Current => "CURRENT",
        }
    }
}

impl ClusterRollup {
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterRollup::Individual => "INDIVIDUAL",
            ClusterRollup::Collective => "COLLECTIVE",
        }
    }
}

/// Per-metric collection properties, found in a `Metric` block's `Properties`:
///
/// ```text
/// <Metric>
///     Name "CPU"
///     <Properties>
///         Alias "CPU Utilization"
///         Multiplier 100
///         AggregationType "AVERAGE"
///     </Properties>
/// </Metric>
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
#[serde(deny_unknown_fields)]
pub struct MetricProperties {
    /// Name shown in the metric path instead of the collected name
    pub alias: Option<String>,

    /// Applied to numeric values before they are reported
    pub multiplier: Option<f64>,

    pub aggregation_type: Option<AggregationType>,

    #[serde(rename = "TimeRollUpType")]
    pub time_rollup: Option<TimeRollup>,

    #[serde(rename = "ClusterRollUpType")]
    pub cluster_rollup: Option<ClusterRollup>,
}

impl MetricProperties {
    /// The rollup hints as the string map a `Metric` carries
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(x) = self.aggregation_type {
            map.insert(AGGREGATION_TYPE.to_owned(), x.as_str().to_owned());
        }
        if let Some(x) = self.time_rollup {
            map.insert(TIME_ROLLUP_TYPE.to_owned(), x.as_str().to_owned());
        }
        if let Some(x) = self.cluster_rollup {
            map.insert(CLUSTER_ROLLUP_TYPE.to_owned(), x.as_str().to_owned());
        }
        map
    }
}

/// A single normalized measurement. Immutable once built; use `MetricBuilder`.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    value: MetricValue,
    path: MetricPath,
    properties: BTreeMap<String, String>,
}

impl Metric {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    pub fn path(&self) -> &MetricPath {
        &self.path
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.path, self.value)
    }
}

/// Creates a metric from a small set of named fields.
///
/// # Examples
///
/// ```
/// use extension_monitor::{MetricBuilder, MetricPath, MetricValue};
///
/// let prefix = MetricPath::parse("Custom Metrics|Extension Starter", '|').unwrap();
/// let metric = MetricBuilder::new("Heart Beat", 1)
///     .prefix(&prefix)
///     .build()
///     .unwrap();
///
/// assert_eq!(&MetricValue::Integer(1), metric.value());
/// assert_eq!(
///     "Custom Metrics|Extension Starter|Heart Beat",
///     metric.path().to_string()
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBuilder {
    name: String,
    value: MetricValue,
    path: Option<MetricPath>,
    prefix: Option<MetricPath>,
    properties: BTreeMap<String, String>,
}

impl MetricBuilder {
    pub fn new<N: Into<String>, V: Into<MetricValue>>(name: N, value: V) -> MetricBuilder {
        MetricBuilder {
            name: name.into(),
            value: value.into(),
            path: None,
            prefix: None,
            properties: BTreeMap::new(),
        }
    }

    /// The complete path. Takes precedence over `prefix`.
    pub fn path(mut self, path: MetricPath) -> MetricBuilder {
        self.path = Some(path);
        self
    }

    /// The metric's path becomes `prefix` followed by the metric name
    pub fn prefix(mut self, prefix: &MetricPath) -> MetricBuilder {
        self.prefix = Some(prefix.clone());
        self
    }

    pub fn property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> MetricBuilder {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(mut self, properties: &MetricProperties) -> MetricBuilder {
        self.properties.extend(properties.to_map());
        self
    }

    /// Validates the fields and freezes them into a `Metric`
    pub fn build(self) -> Result<Metric, MetricError> {
        if self.name.is_empty() {
            return Err(MetricError::EmptyName);
        }

        if let MetricValue::Float(x) = self.value {
            if !x.is_finite() {
                return Err(MetricError::NonFinite(x));
            }
        }

        let path = match (self.path, self.prefix) {
            (Some(path), _) => path,
            (None, Some(prefix)) => prefix.child(self.name.as_str())?,
            (None, None) => MetricPath::new(Some(self.name.as_str()))?,
        };

        if contains_separator(&self.name, path.separator()) {
            return Err(MetricError::ReservedCharacter {
                value: self.name,
                separator: path.separator(),
            });
        }

        Ok(Metric {
            name: self.name,
            value: self.value,
            path,
            properties: self.properties,
        })
    }
}
