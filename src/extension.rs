use crate::api::{ConfigItem, MetricPath};
use crate::collector::Collectors;
use crate::config::ExtensionConfig;
use crate::cycle::{Completion, CycleRunner, Host};
use crate::dispatch::{TaskExecutor, TokioExecutor};
use crate::errors::ExtensionError;
use crate::sink::{Batch, ReportSink};
use log::{error, info};
use std::error::Error;
use tokio::runtime::{self, Runtime};

/// Defines an extension: its name and how to build collectors from the validated configuration
pub trait ExtensionManager {
    /// Name of the extension. Used as the logging prefix and for naming worker threads.
    fn name() -> &'static str;

    /// Called once at startup. An error here prevents the extension from starting.
    fn collectors(config: &ExtensionConfig) -> Result<Collectors, Box<dyn Error + Send + Sync>>;
}

pub type CompletionCallback = Box<dyn Fn(&Completion) + Send + Sync>;

/// A `Host` backed by a tokio runtime. On completion it reports the heartbeat (when a prefix is
/// set) through the same sink before running the user's callback.
pub struct TokioHost {
    executor: TokioExecutor,
    sink: Box<dyn ReportSink>,
    heartbeat: Option<MetricPath>,
    callback: Option<CompletionCallback>,
}

impl TokioHost {
    pub fn new(executor: TokioExecutor, sink: Box<dyn ReportSink>) -> TokioHost {
        TokioHost {
            executor,
            sink,
            heartbeat: None,
            callback: None,
        }
    }

    /// Reports `Heart Beat` under `prefix` after every cycle
    pub fn heartbeat(mut self, prefix: MetricPath) -> TokioHost {
        self.heartbeat = Some(prefix);
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> TokioHost
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }
}

impl Host for TokioHost {
    fn executor(&self) -> &dyn TaskExecutor {
        &self.executor
    }

    fn sink(&self) -> &dyn ReportSink {
        &*self.sink
    }

    fn on_complete(&self, completion: &Completion) {
        if let Some(ref prefix) = self.heartbeat {
            match completion.heartbeat(prefix) {
                Ok(beat) => {
                    if let Err(e) = self.sink.report(&Batch::new(vec![beat], Vec::new())) {
                        error!("unable to report heartbeat: {}", e);
                    }
                }
                Err(e) => error!("unable to build heartbeat: {}", e),
            }
        }

        if let Some(ref callback) = self.callback {
            callback(completion);
        }
    }
}

/// Synchronous entry point for a host that polls the extension once per interval
pub struct Extension {
    name: &'static str,
    config: ExtensionConfig,
    runner: CycleRunner,
    host: TokioHost,

    // dropped last
    runtime: Runtime,
}

impl Extension {
    /// Validates the configuration and starts the worker runtime. `NumberOfThreads` sizes both
    /// the runtime and the number of targets collected at once.
    pub fn new<M: ExtensionManager>(
        items: &[ConfigItem],
        sink: Box<dyn ReportSink>,
    ) -> Result<Extension, ExtensionError> {
        let config = ExtensionConfig::from_config(items)?;
        let collectors = M::collectors(&config).map_err(ExtensionError::Manager)?;

        let mut builder = runtime::Builder::new_multi_thread();
        if let Some(threads) = config.dispatch.concurrency {
            builder.worker_threads(threads);
        }
        let runtime = builder
            .enable_all()
            .thread_name(M::name())
            .build()
            .map_err(ExtensionError::Runtime)?;

        let executor = TokioExecutor::new(runtime.handle().clone());
        let host = TokioHost::new(executor, sink).heartbeat(config.metric_prefix.clone());
        let runner = CycleRunner::from_config(&config, collectors);

        info!(
            "{} configured with {} targets and {} metrics",
            M::name(),
            config.targets.len(),
            config.metrics.len()
        );

        Ok(Extension {
            name: M::name(),
            config,
            runner,
            host,
            runtime,
        })
    }

    /// Registers a closure to run after every cycle, following the heartbeat
    pub fn on_complete<F>(mut self, f: F) -> Extension
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        self.host = self.host.on_complete(f);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    /// Runs one cycle to completion on the worker runtime. Must not be called from within an
    /// async context.
    pub fn execute(&self) -> Completion {
        self.runtime.block_on(self.runner.run(&self.host))
    }
}
