use crate::api::{Metric, MetricProperties, MetricValue};
use crate::errors::CollectionError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// One external system that metrics are collected from. Read-only for the length of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: String,
    kind: Option<String>,
    connection: BTreeMap<String, String>,
}

impl Target {
    pub fn new<T: Into<String>>(name: T) -> Target {
        Target {
            name: name.into(),
            kind: None,
            connection: BTreeMap::new(),
        }
    }

    /// Selects the collector registered under `kind`
    pub fn with_kind<T: Into<String>>(mut self, kind: T) -> Target {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Target {
        self.connection.insert(key.into(), value.into());
        self
    }

    /// Unique within a cycle
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.connection.get(key).map(String::as_str)
    }

    pub fn connection(&self) -> &BTreeMap<String, String> {
        &self.connection
    }
}

/// Describes what to collect, not the collected value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricSpec {
    pub name: String,
    pub properties: MetricProperties,
}

impl MetricSpec {
    pub fn new<T: Into<String>>(name: T) -> MetricSpec {
        MetricSpec {
            name: name.into(),
            properties: MetricProperties::default(),
        }
    }

    pub fn with_properties(mut self, properties: MetricProperties) -> MetricSpec {
        self.properties = properties;
        self
    }

    /// The alias when one is configured
    pub fn display_name(&self) -> &str {
        self.properties.alias.as_deref().unwrap_or(&self.name)
    }

    /// Applies the configured multiplier, if any, to a collected value
    pub fn apply_multiplier(&self, value: MetricValue) -> MetricValue {
        match self.properties.multiplier {
            Some(factor) => value.scale(factor),
            None => value,
        }
    }
}

/// The outcome of collecting from one target. Exactly one is produced per target per cycle.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    target: Target,
    metrics: Vec<Metric>,
    error: Option<CollectionError>,
}

impl CollectionResult {
    pub fn success(target: Target, metrics: Vec<Metric>) -> CollectionResult {
        CollectionResult {
            target,
            metrics,
            error: None,
        }
    }

    pub fn failure(target: Target, error: CollectionError) -> CollectionResult {
        CollectionResult {
            target,
            metrics: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn error(&self) -> Option<&CollectionError> {
        self.error.as_ref()
    }

    pub fn into_metrics(self) -> Vec<Metric> {
        self.metrics
    }
}

/// Produces metrics for a single target.
///
/// Implementors only write `fetch`; `collect` captures every failure into the returned
/// `CollectionResult` so nothing escapes a collector's boundary. Panics are caught one level
/// up, by the dispatcher.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Name of the collector for logging purposes
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        target: &Target,
        specs: &[MetricSpec],
    ) -> Result<Vec<Metric>, Box<dyn Error + Send + Sync>>;

    async fn collect(&self, target: &Target, specs: &[MetricSpec]) -> CollectionResult {
        match self.fetch(target, specs).await {
            Ok(metrics) => CollectionResult::success(target.clone(), metrics),
            Err(e) => CollectionResult::failure(
                target.clone(),
                CollectionError::Collector(Arc::from(e)),
            ),
        }
    }
}

pub type CollectorRef = Arc<dyn Collector>;

/// Resolves the collector responsible for each target. Targets that name a `Type` must match a
/// registered kind; targets without one use the fallback.
#[derive(Clone, Default)]
pub struct Collectors {
    fallback: Option<CollectorRef>,
    by_kind: BTreeMap<String, CollectorRef>,
}

impl Collectors {
    pub fn new() -> Collectors {
        Default::default()
    }

    /// Every target without a `Type` is collected by `collector`
    pub fn single<C: Collector + 'static>(collector: C) -> Collectors {
        Collectors::new().fallback(collector)
    }

    pub fn fallback<C: Collector + 'static>(mut self, collector: C) -> Collectors {
        self.fallback = Some(Arc::new(collector));
        self
    }

    pub fn register<K: Into<String>, C: Collector + 'static>(
        mut self,
        kind: K,
        collector: C,
    ) -> Collectors {
        self.by_kind.insert(kind.into(), Arc::new(collector));
        self
    }

    pub fn resolve(&self, target: &Target) -> Option<CollectorRef> {
        match target.kind() {
            Some(kind) => self.by_kind.get(kind).cloned(),
            None => self.fallback.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fallback.is_none() && self.by_kind.is_empty()
    }
}

impl fmt::Debug for Collectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collectors")
            .field("fallback", &self.fallback.as_ref().map(|c| c.name()))
            .field("kinds", &self.by_kind.keys().collect::<Vec<_>>())
            .finish()
    }
}
