//! Building blocks for monitoring agent extensions that poll a set of targets once per
//! interval.
//!
//! A cycle fans out one collector per configured target, derives cluster-wide metrics from the
//! results, and hands the finished batch to a report sink. A target that fails, times out, or
//! panics still yields a result, so a broken target never hides the metrics of healthy ones.
//!
//! ```no_run
//! use extension_monitor::{
//!     Collectors, ConfigItem, Extension, ExtensionConfig, ExtensionManager, FixedCollector,
//!     MetricNamer, WriterSink,
//! };
//! use std::error::Error;
//!
//! struct Starter;
//!
//! impl ExtensionManager for Starter {
//!     fn name() -> &'static str {
//!         "starter"
//!     }
//!
//!     fn collectors(config: &ExtensionConfig) -> Result<Collectors, Box<dyn Error + Send + Sync>> {
//!         Ok(Collectors::single(FixedCollector::new(MetricNamer::from_config(config))))
//!     }
//! }
//!
//! let config = vec![
//!     ConfigItem::new("Server").child(ConfigItem::with_value("Name", "Node1")),
//!     ConfigItem::new("Metric").child(ConfigItem::with_value("Name", "CPU")),
//! ];
//!
//! let sink = Box::new(WriterSink::new(std::io::stdout()));
//! let extension = Extension::new::<Starter>(&config, sink).unwrap();
//! let completion = extension.execute();
//! assert!(completion.is_success());
//! ```
pub mod aggregate;
pub mod api;
pub mod collector;
pub mod collectors;
pub mod config;
pub mod cycle;
pub mod de;
pub mod dispatch;
pub mod errors;
pub mod extension;
mod ser;
pub mod sink;

pub use crate::aggregate::{Aggregations, Aggregator};
pub use crate::api::{
    AggregationType, ClusterRollup, ConfigItem, ConfigValue, ExtensionLogger,
    ExtensionLoggerBuilder, LogLevel, LogTarget, Metric, MetricBuilder, MetricPath,
    MetricProperties, MetricValue, Replacement, Replacements, StderrTarget, TimeRollup,
};
pub use crate::collector::{CollectionResult, Collector, Collectors, MetricSpec, Target};
pub use crate::collectors::{FileCollector, FixedCollector, MetricNamer};
pub use crate::config::ExtensionConfig;
pub use crate::cycle::{Completion, CycleRunner, CycleState, Host};
pub use crate::dispatch::{DispatchOptions, Dispatcher, TaskExecutor, TokioExecutor};
pub use crate::errors::{
    CollectionError, ConfigError, CycleError, ExtensionError, MetricError, ReportError,
};
pub use crate::extension::{Extension, ExtensionManager, TokioHost};
pub use crate::sink::{Batch, LogSink, MemorySink, ReportSink, WriterSink};
