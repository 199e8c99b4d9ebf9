use crate::extension::ExtensionManager;
use env_logger::filter;
use log::{self, Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::error;
use std::fmt;
use std::str::FromStr;

/// Where forwarded log lines end up. The host agent usually supplies its own logging facility;
/// `StderrTarget` is used when it does not.
pub trait LogTarget: Send + Sync {
    fn write(&self, lvl: LogLevel, message: &str);
}

/// Writes `[LEVEL] message` lines to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTarget;

impl LogTarget for StderrTarget {
    fn write(&self, lvl: LogLevel, message: &str) {
        eprintln!("[{}] {}", lvl, message);
    }
}

/// Builds a `log` implementation that filters records the way `env_logger` does and forwards
/// the survivors to a `LogTarget`.
#[derive(Default)]
pub struct ExtensionLoggerBuilder {
    filter: filter::Builder,
    prefix: Option<String>,
    target: Option<Box<dyn LogTarget>>,
}

impl ExtensionLoggerBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Installs the logger as the global `log` logger. Fails if a logger is already installed.
    pub fn try_init(&mut self) -> Result<(), SetLoggerError> {
        let logger = self.build();
        log::set_max_level(logger.filter());
        log::set_boxed_logger(Box::new(logger))
    }

    pub fn build(&mut self) -> ExtensionLogger {
        ExtensionLogger {
            filter: self.filter.build(),
            prefix: self.prefix.take(),
            target: self
                .target
                .take()
                .unwrap_or_else(|| Box::new(StderrTarget)),
        }
    }

    /// Prefixes every message with the extension's name
    pub fn prefix_extension<T: ExtensionManager>(&mut self) -> &mut Self {
        self.prefix(T::name())
    }

    pub fn prefix(&mut self, prefix: &str) -> &mut Self {
        self.prefix = Some(prefix.to_owned());
        self
    }

    pub fn target(&mut self, target: Box<dyn LogTarget>) -> &mut Self {
        self.target = Some(target);
        self
    }

    pub fn filter_level(&mut self, level: LevelFilter) -> &mut Self {
        self.filter.filter_level(level);
        self
    }

    pub fn filter_module(&mut self, module: &str, level: LevelFilter) -> &mut Self {
        self.filter.filter_module(module, level);
        self
    }

    pub fn filter(&mut self, module: Option<&str>, level: LevelFilter) -> &mut Self {
        self.filter.filter(module, level);
        self
    }

    /// Parses `RUST_LOG` style directives, e.g. `info,extension_monitor::dispatch=debug`
    pub fn parse(&mut self, filters: &str) -> &mut Self {
        self.filter.parse(filters);
        self
    }
}

pub struct ExtensionLogger {
    filter: filter::Filter,
    prefix: Option<String>,
    target: Box<dyn LogTarget>,
}

impl log::Log for ExtensionLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if self.matches(record) {
            let lvl = LogLevel::from(record.level());
            let s = match self.prefix {
                Some(ref p) => format!("{}: {}", p, record.args()),
                None => format!("{}", record.args()),
            };
            self.target.write(lvl, &s);
        }
    }

    fn flush(&self) {}
}

impl ExtensionLogger {
    /// Checks if this record matches the configured filter.
    pub fn matches(&self, record: &Record<'_>) -> bool {
        self.filter.matches(record)
    }

    /// Returns the maximum `LevelFilter` that this logger instance is configured to output.
    pub fn filter(&self) -> LevelFilter {
        self.filter.filter()
    }
}

/// The levels the host agent understands
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum LogLevel {
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Notice => "NOTICE",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// `log` has no notice level, so it shares a filter with info
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Notice | LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a level name is not one of the host's levels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(pub String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Did not expect log level of: {} (ERROR | WARN | INFO | DEBUG | NOTICE)",
            self.0
        )
    }
}

impl error::Error for ParseLevelError {}

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "ERR" | "ERROR" => Ok(LogLevel::Error),
            "WARN" | "WARNING" => Ok(LogLevel::Warning),
            "NOTICE" => Ok(LogLevel::Notice),
            _ => Err(ParseLevelError(s.to_owned())),
        }
    }
}

impl From<Level> for LogLevel {
    fn from(lvl: Level) -> Self {
        match lvl {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warning,
            Level::Info => LogLevel::Info,
            Level::Debug | Level::Trace => LogLevel::Debug,
        }
    }
}
