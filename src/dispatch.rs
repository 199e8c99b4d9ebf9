use crate::collector::{CollectionResult, CollectorRef, Collectors, MetricSpec, Target};
use crate::errors::CollectionError;
use log::{debug, error, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Semaphore};
use tokio::time::{self, Instant};

/// A unit of work handed to the host's worker pool
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The host's job execution service. A job that panics or is dropped before it finishes is
/// reported as `CollectionError::Aborted` for its target.
///
/// Every submitted job must eventually be polled to completion or dropped. The per-target
/// timeout only runs while a job is polled, so without a `cycle_deadline` a job that is held
/// and never polled keeps `Dispatcher::run` waiting.
pub trait TaskExecutor: Send + Sync {
    fn submit(&self, name: &str, job: Job);
}

/// Spawns jobs onto a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> TokioExecutor {
        TokioExecutor { handle }
    }

    /// # Panics
    ///
    /// When called outside of a tokio runtime
    pub fn current() -> TokioExecutor {
        TokioExecutor::new(Handle::current())
    }
}

impl TaskExecutor for TokioExecutor {
    fn submit(&self, name: &str, job: Job) {
        debug!("spawning collection job for {}", name);
        self.handle.spawn(job);
    }
}

pub const DEFAULT_TARGET_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Upper bound on collectors running at once. `None` runs every target at once.
    pub concurrency: Option<usize>,

    /// Time a single collector may run, measured from when it starts rather than when it is
    /// queued
    pub target_timeout: Duration,

    /// Once passed, every collector still running or queued is cancelled
    pub cycle_deadline: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions {
            concurrency: None,
            target_timeout: DEFAULT_TARGET_TIMEOUT,
            cycle_deadline: None,
        }
    }
}

enum Pending {
    Done(CollectionResult),
    Waiting(Target, oneshot::Receiver<CollectionResult>),
}

/// Runs one collector per target and waits until every target has a result
#[derive(Debug, Clone)]
pub struct Dispatcher {
    collectors: Collectors,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(collectors: Collectors, options: DispatchOptions) -> Dispatcher {
        Dispatcher {
            collectors,
            options,
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Returns exactly one result per target, sorted by target name. Collector failures, panics,
    /// timeouts and cancellations are all recorded in the owning target's result.
    pub async fn run(
        &self,
        executor: &dyn TaskExecutor,
        targets: &[Target],
        specs: &[MetricSpec],
    ) -> Vec<CollectionResult> {
        if targets.is_empty() {
            return Vec::new();
        }

        let permits = self.options.concurrency.unwrap_or(targets.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let specs: Arc<[MetricSpec]> = Arc::from(specs);
        // too far out to represent is the same as no deadline
        let deadline = self
            .options
            .cycle_deadline
            .and_then(|d| Instant::now().checked_add(d));

        let mut pending = Vec::with_capacity(targets.len());
        for target in targets {
            let collector = match self.collectors.resolve(target) {
                Some(collector) => collector,
                None => {
                    let kind = target.kind().unwrap_or("<default>").to_owned();
                    warn!("no collector for {} (kind {})", target.name(), kind);
                    let err = CollectionError::NoCollector(kind);
                    pending.push(Pending::Done(CollectionResult::failure(target.clone(), err)));
                    continue;
                }
            };

            let (tx, rx) = oneshot::channel();
            let job = collect_job(
                collector,
                target.clone(),
                Arc::clone(&specs),
                Arc::clone(&semaphore),
                self.options.target_timeout,
                tx,
            );
            executor.submit(target.name(), Box::pin(job));
            pending.push(Pending::Waiting(target.clone(), rx));
        }

        let mut results = Vec::with_capacity(pending.len());
        for entry in pending {
            let (target, rx) = match entry {
                Pending::Done(result) => {
                    results.push(result);
                    continue;
                }
                Pending::Waiting(target, rx) => (target, rx),
            };

            let received = match deadline {
                Some(deadline) => match time::timeout_at(deadline, rx).await {
                    Ok(received) => received,
                    Err(_) => {
                        warn!("cycle deadline passed before {} finished", target.name());
                        results.push(CollectionResult::failure(
                            target,
                            CollectionError::Cancelled,
                        ));
                        continue;
                    }
                },
                None => rx.await,
            };

            match received {
                Ok(result) => results.push(result),
                Err(_) => {
                    error!("collection job for {} ended without a result", target.name());
                    results.push(CollectionResult::failure(target, CollectionError::Aborted));
                }
            }
        }

        results.sort_by(|a, b| a.target().name().cmp(b.target().name()));
        results
    }
}

/// Waits for a permit, then collects under the per-target timeout. Gives up as soon as the
/// receiving side hangs up, which is how the cycle deadline reaches in-flight collectors.
async fn collect_job(
    collector: CollectorRef,
    target: Target,
    specs: Arc<[MetricSpec]>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    mut tx: oneshot::Sender<CollectionResult>,
) {
    let work = async {
        let _permit = semaphore.acquire().await.ok()?;
        debug!("collecting {} with {}", target.name(), collector.name());
        match time::timeout(timeout, collector.collect(&target, &specs)).await {
            Ok(result) => Some(result),
            Err(_) => {
                warn!(
                    "{} timed out after {} ms",
                    target.name(),
                    timeout.as_millis()
                );
                Some(CollectionResult::failure(
                    target.clone(),
                    CollectionError::Timeout(timeout),
                ))
            }
        }
    };

    let outcome = tokio::select! {
        outcome = work => outcome,
        _ = tx.closed() => {
            debug!("collection for {} cancelled", target.name());
            None
        }
    };

    if let Some(result) = outcome {
        let _ = tx.send(result);
    }
}
