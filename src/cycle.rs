use crate::aggregate::Aggregator;
use crate::api::{Metric, MetricBuilder, MetricPath};
use crate::collector::{Collectors, MetricSpec, Target};
use crate::config::ExtensionConfig;
use crate::dispatch::{Dispatcher, TaskExecutor};
use crate::errors::{ConfigError, CycleError, MetricError, ReportError};
use crate::sink::{Batch, ReportSink};
use chrono::prelude::*;
use log::{debug, error, info};
use std::collections::HashSet;
use std::fmt;

pub const HEART_BEAT: &str = "Heart Beat";

/// Stages of a cycle. A cycle moves strictly forward through
/// `Idle -> Dispatching -> Aggregating -> Reporting -> Completed`; `Failed` can be entered from
/// any stage that is not already terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    Idle,
    Dispatching,
    Aggregating,
    Reporting,
    Completed,
    Failed,
}

impl CycleState {
    pub fn is_terminal(self) -> bool {
        match self {
            CycleState::Completed | CycleState::Failed => true,
            _ => false,
        }
    }

    pub fn can_advance_to(self, next: CycleState) -> bool {
        use self::CycleState::*;
        match (self, next) {
            (Idle, Dispatching)
            | (Dispatching, Aggregating)
            | (Aggregating, Reporting)
            | (Reporting, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::Dispatching => "dispatching",
            CycleState::Aggregating => "aggregating",
            CycleState::Reporting => "reporting",
            CycleState::Completed => "completed",
            CycleState::Failed => "failed",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a finished cycle, handed to the host's completion callback
#[derive(Debug)]
pub struct Completion {
    pub state: CycleState,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,

    /// Every state the cycle passed through, starting with `Idle`
    pub transitions: Vec<CycleState>,

    pub targets: usize,

    /// Names of targets whose collection failed, sorted
    pub failed_targets: Vec<String>,

    /// Number of metrics handed to the sink
    pub batch_size: usize,

    /// Why the cycle ended in `Failed`
    pub error: Option<CycleError>,

    /// A failed report does not fail the cycle but is surfaced here
    pub report_error: Option<ReportError>,
}

impl Completion {
    /// The cycle completed and its batch was accepted
    pub fn is_success(&self) -> bool {
        self.state == CycleState::Completed && self.report_error.is_none()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished.signed_duration_since(self.started)
    }

    /// The synthetic metric telling the backend the extension is alive: 1 when the cycle
    /// completed, otherwise 0
    pub fn heartbeat(&self, prefix: &MetricPath) -> Result<Metric, MetricError> {
        let alive = if self.state == CycleState::Completed { 1 } else { 0 };
        MetricBuilder::new(HEART_BEAT, alive).prefix(prefix).build()
    }
}

/// What a cycle needs from the process hosting it
pub trait Host: Send + Sync {
    fn executor(&self) -> &dyn TaskExecutor;

    fn sink(&self) -> &dyn ReportSink;

    /// Called exactly once per cycle, whether it completed or failed
    fn on_complete(&self, _completion: &Completion) {}
}

/// Bookkeeping for a single pass. Created fresh for every run and discarded afterwards.
struct Cycle {
    started: DateTime<Utc>,
    state: CycleState,
    transitions: Vec<CycleState>,
}

impl Cycle {
    fn start() -> Cycle {
        Cycle {
            started: Utc::now(),
            state: CycleState::Idle,
            transitions: vec![CycleState::Idle],
        }
    }

    fn advance(&mut self, next: CycleState) -> Result<(), CycleError> {
        if !self.state.can_advance_to(next) {
            return Err(CycleError::Transition {
                from: self.state,
                to: next,
            });
        }

        debug!("cycle {} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
        Ok(())
    }

    fn finish(
        mut self,
        targets: usize,
        outcome: Result<Outcome, CycleError>,
    ) -> Completion {
        let (outcome, error) = match outcome {
            Ok(outcome) => (outcome, None),
            Err(e) => {
                error!("cycle failed while {}: {}", self.state, e);
                if self.state != CycleState::Failed {
                    self.state = CycleState::Failed;
                    self.transitions.push(CycleState::Failed);
                }
                (Outcome::default(), Some(e))
            }
        };

        Completion {
            state: self.state,
            started: self.started,
            finished: Utc::now(),
            transitions: self.transitions,
            targets,
            failed_targets: outcome.failed_targets,
            batch_size: outcome.batch_size,
            error,
            report_error: outcome.report_error,
        }
    }
}

#[derive(Default)]
struct Outcome {
    failed_targets: Vec<String>,
    batch_size: usize,
    report_error: Option<ReportError>,
}

/// Runs one cycle end to end: dispatch, aggregate, report, then signal completion
#[derive(Debug, Clone)]
pub struct CycleRunner {
    targets: Vec<Target>,
    specs: Vec<MetricSpec>,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
}

impl CycleRunner {
    pub fn new(
        targets: Vec<Target>,
        specs: Vec<MetricSpec>,
        dispatcher: Dispatcher,
        aggregator: Aggregator,
    ) -> CycleRunner {
        CycleRunner {
            targets,
            specs,
            dispatcher,
            aggregator,
        }
    }

    pub fn from_config(config: &ExtensionConfig, collectors: Collectors) -> CycleRunner {
        CycleRunner::new(
            config.targets.clone(),
            config.metrics.clone(),
            Dispatcher::new(collectors, config.dispatch),
            Aggregator::new(config.aggregations, config.metric_prefix.clone()),
        )
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::MissingTargets);
        }

        if self.specs.is_empty() {
            return Err(ConfigError::MissingMetrics);
        }

        let mut seen = HashSet::with_capacity(self.targets.len());
        for target in &self.targets {
            if !seen.insert(target.name()) {
                return Err(ConfigError::DuplicateTarget(target.name().to_owned()));
            }
        }

        Ok(())
    }

    /// Never fails: a fatal error ends the cycle in `Failed` and is recorded in the returned
    /// `Completion`, which is also handed to `host.on_complete` exactly once.
    pub async fn run(&self, host: &dyn Host) -> Completion {
        info!("starting cycle over {} targets", self.targets.len());
        let mut cycle = Cycle::start();
        let outcome = self.drive(&mut cycle, host).await;
        let completion = cycle.finish(self.targets.len(), outcome);

        info!(
            "cycle {} in {} ms: {} metrics, {} of {} targets failed",
            completion.state,
            completion.elapsed().num_milliseconds(),
            completion.batch_size,
            completion.failed_targets.len(),
            completion.targets
        );

        host.on_complete(&completion);
        completion
    }

    async fn drive(&self, cycle: &mut Cycle, host: &dyn Host) -> Result<Outcome, CycleError> {
        if let Err(e) = self.validate() {
            cycle.advance(CycleState::Failed)?;
            return Err(CycleError::from(e));
        }

        cycle.advance(CycleState::Dispatching)?;
        let results = self
            .dispatcher
            .run(host.executor(), &self.targets, &self.specs)
            .await;

        cycle.advance(CycleState::Aggregating)?;
        let derived = self.aggregator.aggregate(&results);

        cycle.advance(CycleState::Reporting)?;
        let mut failed_targets = Vec::new();
        let mut collected = Vec::new();
        for result in results {
            if result.is_success() {
                collected.extend(result.into_metrics());
            } else {
                failed_targets.push(result.target().name().to_owned());
            }
        }

        let batch = Batch::new(collected, derived);
        let report_error = match host.sink().report(&batch) {
            Ok(()) => None,
            Err(e) => {
                error!("unable to report {} metrics: {}", batch.len(), e);
                Some(e)
            }
        };

        cycle.advance(CycleState::Completed)?;
        Ok(Outcome {
            failed_targets,
            batch_size: batch.len(),
            report_error,
        })
    }
}
