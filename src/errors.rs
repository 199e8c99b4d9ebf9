use crate::cycle::CycleState;
use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Errors found while validating the extension configuration. Any of these abort a cycle before
/// a single target is contacted.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The `Server` section is missing or empty
    MissingTargets,

    /// The `Metric` section is missing or empty
    MissingMetrics,

    /// A required name was blank. Holds the section the name belongs to.
    EmptyName(&'static str),

    /// Two targets share a name within the same cycle
    DuplicateTarget(String),

    InvalidValue { key: &'static str, value: String },

    /// A prefix or metric name that could never be rendered into a path
    Metric(MetricError),

    /// The configuration tree did not match the expected shape
    Deserialize(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConfigError::MissingTargets => {
                write!(f, "the 'Server' section is either missing or empty")
            }
            ConfigError::MissingMetrics => {
                write!(f, "the 'Metric' section is either missing or empty")
            }
            ConfigError::EmptyName(section) => write!(f, "a '{}' entry has an empty name", section),
            ConfigError::DuplicateTarget(ref name) => {
                write!(f, "target '{}' is configured more than once", name)
            }
            ConfigError::InvalidValue { key, ref value } => {
                write!(f, "invalid value for {}: {}", key, value)
            }
            ConfigError::Metric(_) => write!(f, "invalid metric naming"),
            ConfigError::Deserialize(ref msg) => write!(f, "malformed configuration: {}", msg),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ConfigError::Metric(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<MetricError> for ConfigError {
    fn from(e: MetricError) -> Self {
        ConfigError::Metric(e)
    }
}

/// Errors that occur when constructing a metric or one of its paths
#[derive(Debug, Clone, PartialEq)]
pub enum MetricError {
    EmptyName,
    EmptyPath,

    /// Position of the blank segment
    EmptySegment(usize),

    /// The value contains the path separator. Separators are never escaped, so the value is
    /// rejected instead.
    ReservedCharacter { value: String, separator: char },

    NonFinite(f64),
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricError::EmptyName => write!(f, "metric name is empty"),
            MetricError::EmptyPath => write!(f, "metric path has no segments"),
            MetricError::EmptySegment(pos) => write!(f, "metric path segment {} is empty", pos),
            MetricError::ReservedCharacter {
                ref value,
                separator,
            } => write!(
                f,
                "`{}` contains the reserved path separator `{}`",
                value, separator
            ),
            MetricError::NonFinite(x) => write!(f, "metric value {} is not finite", x),
        }
    }
}

impl error::Error for MetricError {}

/// A failure isolated to a single target. It is recorded in that target's `CollectionResult`
/// and never aborts the cycle.
#[derive(Debug, Clone)]
pub enum CollectionError {
    /// The collector reported an error
    Collector(Arc<dyn error::Error + Send + Sync>),

    /// The collector did not finish within the per-target timeout
    Timeout(Duration),

    /// The cycle deadline passed before the collector finished
    Cancelled,

    /// The collection job ended without a result: it panicked or the executor dropped it
    Aborted,

    /// No collector is registered for the target's kind
    NoCollector(String),
}

impl CollectionError {
    pub fn is_timeout(&self) -> bool {
        match *self {
            CollectionError::Timeout(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CollectionError::Collector(ref e) => write!(f, "collector failed: {}", e),
            CollectionError::Timeout(d) => {
                write!(f, "collection timed out after {} ms", d.as_millis())
            }
            CollectionError::Cancelled => write!(f, "collection cancelled by the cycle deadline"),
            CollectionError::Aborted => write!(f, "collection job ended without a result"),
            CollectionError::NoCollector(ref kind) => {
                write!(f, "no collector registered for kind '{}'", kind)
            }
        }
    }
}

impl error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            CollectionError::Collector(ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Errors that occur when handing a batch to the reporting transport
#[derive(Debug)]
pub enum ReportError {
    Io(io::Error),

    /// A previous writer panicked while holding the sink
    Poisoned,

    /// The transport refused the batch
    Rejected(String),

    Sink(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ReportError::Io(_) => write!(f, "unable to write metrics"),
            ReportError::Poisoned => write!(f, "report sink is poisoned"),
            ReportError::Rejected(ref reason) => write!(f, "batch rejected: {}", reason),
            ReportError::Sink(ref e) => write!(f, "report sink failed: {}", e),
        }
    }
}

impl error::Error for ReportError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ReportError::Io(ref e) => Some(e),
            ReportError::Sink(ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for ReportError {
    fn from(e: io::Error) -> Self {
        ReportError::Io(e)
    }
}

/// Errors that end a cycle in the `Failed` state
#[derive(Debug, Clone, PartialEq)]
pub enum CycleError {
    Configuration(ConfigError),

    /// An attempt to skip or reverse a stage
    Transition { from: CycleState, to: CycleState },
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CycleError::Configuration(ref e) => write!(f, "configuration error: {}", e),
            CycleError::Transition { from, to } => {
                write!(f, "illegal cycle transition {} -> {}", from, to)
            }
        }
    }
}

impl error::Error for CycleError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            CycleError::Configuration(ref e) => Some(e),
            CycleError::Transition { .. } => None,
        }
    }
}

impl From<ConfigError> for CycleError {
    fn from(e: ConfigError) -> Self {
        CycleError::Configuration(e)
    }
}

/// Errors raised while standing up an `Extension` for the host
#[derive(Debug)]
pub enum ExtensionError {
    Config(ConfigError),

    /// The worker runtime could not be started
    Runtime(io::Error),

    /// The extension manager refused to build its collectors
    Manager(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for ExtensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ExtensionError::Config(ref e) => write!(f, "{}", e),
            ExtensionError::Runtime(_) => write!(f, "unable to start the collection runtime"),
            ExtensionError::Manager(ref e) => write!(f, "extension setup failed: {}", e),
        }
    }
}

impl error::Error for ExtensionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ExtensionError::Config(ref e) => Some(e),
            ExtensionError::Runtime(ref e) => Some(e),
            ExtensionError::Manager(ref e) => Some(e.as_ref()),
        }
    }
}

impl From<ConfigError> for ExtensionError {
    fn from(e: ConfigError) -> Self {
        ExtensionError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_source() {
        let err = ConfigError::from(MetricError::EmptyName);
        assert_eq!(err.to_string(), "invalid metric naming");
        assert!(err.source().is_some());
        assert!(ConfigError::MissingTargets.source().is_none());
    }

    #[test]
    fn test_collection_error_timeout() {
        let err = CollectionError::Timeout(Duration::from_millis(1500));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "collection timed out after 1500 ms");
        assert!(!CollectionError::Cancelled.is_timeout());
    }

    #[test]
    fn test_reserved_character_display() {
        let err = MetricError::ReservedCharacter {
            value: String::from("Pipe|"),
            separator: '|',
        };
        assert_eq!(
            err.to_string(),
            "`Pipe|` contains the reserved path separator `|`"
        );
    }
}
