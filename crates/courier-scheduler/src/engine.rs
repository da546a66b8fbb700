use std::sync::Arc;
use std::time::Duration;

use courier_store::{JobStore, ScheduledAt};
use courier_transfer::TransferClient;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    error::{Result, SchedulerError},
    runner::{Executor, JobOutcome},
};

/// Queue depth for pass requests. Ticks beyond this are dropped, not queued.
const PASS_QUEUE_DEPTH: usize = 8;

/// A request for one execution pass.
enum Pass {
    /// Deliver pending jobs that are due now.
    Tick,
    /// Deliver every pending job and reply with the outcomes.
    RunNow(oneshot::Sender<Result<Vec<JobOutcome>>>),
}

/// Summary of one timed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub now: ScheduledAt,
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Finds due jobs and delivers them, one pass at a time.
///
/// Call [`SchedulerEngine::start`] to run it: a single worker task executes
/// every pass (timed or on demand) from one queue, so two passes can never
/// overlap, and a timer task feeds it a tick every `interval`.
pub struct SchedulerEngine {
    store: Arc<JobStore>,
    executor: Executor,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl SchedulerEngine {
    /// Fails with [`SchedulerError::ZeroInterval`] if `interval` is zero.
    pub fn new(
        store: Arc<JobStore>,
        transfer: Arc<dyn TransferClient>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        Ok(Self {
            executor: Executor::new(Arc::clone(&store), transfer),
            store,
            clock,
            interval,
        })
    }

    /// One scan: deliver every pending job with `scheduled_at <= now`,
    /// earliest first.
    ///
    /// Per-job failures are recorded on the job. An error here means the scan
    /// itself could not run; the next tick retries.
    pub async fn tick(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let due = self.store.list_due(now)?;
        if due.is_empty() {
            debug!(%now, "no jobs due");
            return Ok(TickReport {
                now,
                due: 0,
                completed: 0,
                failed: 0,
            });
        }

        info!(%now, due = due.len(), "scheduler pass started");
        let outcomes = self.executor.execute_all(&due).await;
        let completed = outcomes.iter().filter(|o| o.is_success()).count();
        let report = TickReport {
            now,
            due: due.len(),
            completed,
            failed: outcomes.len() - completed,
        };
        info!(
            %now,
            due = report.due,
            completed = report.completed,
            failed = report.failed,
            "scheduler pass finished"
        );
        Ok(report)
    }

    /// Deliver every pending job now, ignoring `scheduled_at`.
    pub async fn run_pending(&self) -> Result<Vec<JobOutcome>> {
        let pending = self.store.list_pending()?;
        info!(count = pending.len(), "immediate run started");
        let outcomes = self.executor.execute_all(&pending).await;
        info!(
            count = outcomes.len(),
            completed = outcomes.iter().filter(|o| o.is_success()).count(),
            "immediate run finished"
        );
        Ok(outcomes)
    }

    /// Spawn the worker and timer tasks.
    pub fn start(self) -> RunningScheduler {
        let (pass_tx, pass_rx) = mpsc::channel(PASS_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = self.interval;

        info!(interval_secs = interval.as_secs(), "scheduler started");
        let worker = tokio::spawn(run_worker(self, pass_rx, shutdown_rx.clone()));
        let timer = tokio::spawn(run_timer(pass_tx.clone(), interval, shutdown_rx));

        RunningScheduler {
            handle: SchedulerHandle { tx: pass_tx },
            shutdown_tx,
            worker,
            timer,
        }
    }
}

/// Owns the background tasks of a started [`SchedulerEngine`].
pub struct RunningScheduler {
    handle: SchedulerHandle,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
    timer: JoinHandle<()>,
}

impl RunningScheduler {
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stop future ticks and wait for the pass in flight, if any, to finish.
    ///
    /// A running transfer is never aborted. Queued requests that have not
    /// started are dropped and their callers get [`SchedulerError::Stopped`].
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.timer.await {
            error!("scheduler timer task failed: {e}");
        }
        if let Err(e) = self.worker.await {
            error!("scheduler worker task failed: {e}");
        }
        info!("scheduler stopped");
    }
}

/// Cloneable handle for requesting passes from request handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Pass>,
}

impl SchedulerHandle {
    /// Run every pending job now on the worker and return the outcomes.
    ///
    /// Waits behind any pass already in progress.
    pub async fn run_now(&self) -> Result<Vec<JobOutcome>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Pass::RunNow(reply_tx))
            .await
            .map_err(|_| SchedulerError::Stopped)?;
        reply_rx.await.map_err(|_| SchedulerError::Stopped)?
    }

    /// Ask for a timed scan outside the regular interval.
    ///
    /// Returns `false` if the queue is full or the scheduler has stopped.
    pub fn request_tick(&self) -> bool {
        self.tx.try_send(Pass::Tick).is_ok()
    }
}

async fn run_worker(
    engine: SchedulerEngine,
    mut rx: mpsc::Receiver<Pass>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            pass = rx.recv() => match pass {
                Some(Pass::Tick) => {
                    if let Err(e) = engine.tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                Some(Pass::RunNow(reply)) => {
                    let result = engine.run_pending().await;
                    if let Err(ref e) = result {
                        error!("immediate run error: {e}");
                    }
                    if reply.send(result).is_err() {
                        warn!("immediate run finished but the caller is gone");
                    }
                }
                None => break,
            }
        }
    }
    debug!("scheduler worker exited");
}

async fn run_timer(tx: mpsc::Sender<Pass>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => match tx.try_send(Pass::Tick) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("pass queue full, tick skipped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("scheduler timer exited");
}
