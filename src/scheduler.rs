//! Self-throttling periodic task runner.
//!
//! One background worker per [`Scheduler`] wakes at most every
//! `min_interval`, runs the task once `interval` has elapsed since the last
//! run, and never lets two executions overlap. Manual triggers contend for
//! the same non-blocking lock; a run that cannot take the lock is skipped,
//! never queued.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use crate::relay::RelayResult;

/// Boxed future returned by a scheduled task.
pub type TaskFuture = Pin<Box<dyn Future<Output = RelayResult<()>> + Send + 'static>>;

type TaskFn = dyn Fn() -> TaskFuture + Send + Sync;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid schedule: interval {interval:?} must be >= min interval {min_interval:?} > 0")]
    InvalidSchedule {
        interval: Duration,
        min_interval: Duration,
    },
}

struct SchedulerInner {
    interval: Duration,
    min_interval: Duration,
    task: Box<TaskFn>,
    /// Execution lock; owned by the run itself, not by whoever started it.
    execution: Arc<Mutex<()>>,
    /// Set and cleared while `execution` is held.
    running: AtomicBool,
    /// Written only while `execution` is held.
    last_run: StdMutex<Option<Instant>>,
}

impl SchedulerInner {
    fn last_run(&self) -> Option<Instant> {
        *self
            .last_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run the task if nobody else is. Returns whether it ran.
    ///
    /// The run is detached from the caller: dropping the returned future
    /// leaves the lock held until the task completes.
    async fn try_run(self: &Arc<Self>) -> bool {
        let Ok(guard) = self.execution.clone().try_lock_owned() else {
            return false;
        };
        self.running.store(true, Ordering::SeqCst);

        let inner = self.clone();
        let run = tokio::spawn(async move {
            match tokio::spawn((inner.task)()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::error!("scheduled task failed: {err}"),
                Err(err) => log::error!("scheduled task aborted: {err}"),
            }

            *inner
                .last_run
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Instant::now());
            inner.running.store(false, Ordering::SeqCst);
            drop(guard);
        });

        if let Err(err) = run.await {
            log::error!("scheduled run terminated abnormally: {err}");
        }
        true
    }

    /// Time left until the next run is due, or `None` if it is due now.
    fn remaining(&self) -> Option<Duration> {
        let last = self.last_run()?;
        let elapsed = last.elapsed();
        (elapsed < self.interval).then(|| self.interval - elapsed)
    }

    async fn run_loop(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        log::debug!(
            "scheduler started (interval {:?}, min interval {:?})",
            self.interval,
            self.min_interval
        );
        loop {
            if *stop.borrow() {
                break;
            }

            let wait = match self.remaining() {
                Some(remaining) => remaining.min(self.min_interval),
                None => {
                    if self.try_run().await {
                        continue;
                    }
                    // another run holds the lock
                    self.min_interval
                }
            };

            tokio::select! {
                _ = sleep(wait) => {}
                _ = stop.changed() => break,
            }
        }
        log::debug!("scheduler stopped");
    }
}

/// Periodic runner for a single no-argument task.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    stop_tx: watch::Sender<bool>,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler. Fails unless `interval >= min_interval > 0`.
    pub fn new<F, Fut>(interval: Duration, min_interval: Duration, task: F) -> Result<Self, ScheduleError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RelayResult<()>> + Send + 'static,
    {
        if min_interval.is_zero() || interval < min_interval {
            return Err(ScheduleError::InvalidSchedule {
                interval,
                min_interval,
            });
        }

        let task: Box<TaskFn> = Box::new(move || -> TaskFuture { Box::pin(task()) });
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                interval,
                min_interval,
                task,
                execution: Arc::new(Mutex::new(())),
                running: AtomicBool::new(false),
                last_run: StdMutex::new(None),
            }),
            stop_tx,
            worker: StdMutex::new(None),
        })
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /// Completion time of the most recent run, timer-driven or manual.
    pub fn last_run(&self) -> Option<Instant> {
        self.inner.last_run()
    }

    /// True while a run holds the execution lock.
    pub fn is_executing(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Spawn the background worker on the current tokio runtime. The first
    /// run happens immediately. Calling `start` twice is a no-op.
    pub fn start(&self) {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if worker.is_some() {
            return;
        }
        let stop_rx = self.stop_tx.subscribe();
        *worker = Some(tokio::spawn(self.inner.clone().run_loop(stop_rx)));
    }

    /// Run the task now unless a run is already in flight.
    pub async fn trigger_now(&self) -> bool {
        self.inner.try_run().await
    }

    /// Signal the worker to exit and wait for it. A run already in flight,
    /// timed or manual, finishes first; it is never cancelled.
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            log::error!("scheduler worker terminated abnormally: {err}");
        }
        let _idle = self.inner.execution.lock().await;
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}
