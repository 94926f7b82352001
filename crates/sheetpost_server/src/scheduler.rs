//! Polling scheduler with single-flight execution and bounded shutdown.

use crate::{Clock, PublishReport, PublishTask, ScheduleConfig, SystemClock, TargetTime};
use chrono::{NaiveDate, NaiveDateTime};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use sheetpost_error::{SchedulerError, SchedulerErrorKind};
use sheetpost_rate_limit::{RateLimiter, RetryPolicy};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

type CleanupCallback = Box<dyn FnOnce() -> Result<(), SchedulerError> + Send>;
type Outcome = Result<PublishReport, SchedulerError>;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SchedulerState {
    /// Not running
    Stopped,
    /// Bootstrap execution is being launched
    Starting,
    /// Polling the clock
    Running,
    /// Shutdown in progress
    ShuttingDown,
}

/// Snapshot returned by [`Scheduler::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    /// Lifecycle state
    pub state: SchedulerState,
    /// Whether the scheduler is starting or running
    pub running: bool,
    /// Whether shutdown has been requested since the last start
    pub shutdown_requested: bool,
    /// Daily target time as `HH:MM`
    pub target_time: String,
    /// Seconds between clock checks
    pub check_interval_seconds: u64,
    /// Whether an execution is in flight
    pub task_in_flight: bool,
    /// Registered cleanup callbacks not yet run
    pub cleanup_callbacks: usize,
    /// Executions left running when shutdown timed out
    pub abandoned_tasks: u64,
    /// Date of the most recent scheduled trigger
    pub last_triggered: Option<NaiveDate>,
    /// Executions started
    pub executions: u64,
    /// Executions that ended in failure
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    executions: AtomicU64,
    failures: AtomicU64,
}

/// A spawned execution and the flag it raises when done.
struct Execution {
    handle: JoinHandle<()>,
    done: watch::Receiver<bool>,
}

struct SchedulerInner {
    state: SchedulerState,
    shutdown_requested: bool,
    current_task: Option<Execution>,
    cleanup_callbacks: Vec<CleanupCallback>,
    last_triggered: Option<NaiveDate>,
    abandoned_tasks: u64,
}

impl SchedulerInner {
    fn task_in_flight(&self) -> bool {
        self.current_task
            .as_ref()
            .is_some_and(|execution| !execution.handle.is_finished())
    }

    fn accepts_launches(&self) -> bool {
        matches!(
            self.state,
            SchedulerState::Starting | SchedulerState::Running
        )
    }
}

/// Runs a [`PublishTask`] once at start and then daily at a target time.
///
/// Share it behind an `Arc`: one context awaits [`start`](Self::start) while
/// others call [`shutdown`](Self::shutdown) or [`status`](Self::status).
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = Arc::new(Scheduler::from_config(publisher, &config.schedule)?);
/// scheduler.spawn_signal_listener();
/// scheduler.start().await?;
/// ```
pub struct Scheduler<T: PublishTask, C: Clock = SystemClock> {
    task: Arc<T>,
    clock: C,
    target: TargetTime,
    check_interval: Duration,
    shutdown_timeout: Duration,
    limiter: Option<RateLimiter>,
    retry: RetryPolicy,
    counters: Arc<Counters>,
    shutdown_tx: watch::Sender<bool>,
    inner: Mutex<SchedulerInner>,
}

impl<T: PublishTask> Scheduler<T, SystemClock> {
    /// Create a scheduler on the system clock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInterval` for a zero check interval.
    pub fn new(
        task: T,
        target: TargetTime,
        check_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        if check_interval.is_zero() {
            return Err(SchedulerError::new(SchedulerErrorKind::InvalidInterval));
        }
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            task: Arc::new(task),
            clock: SystemClock,
            target,
            check_interval,
            shutdown_timeout: Duration::from_secs(30),
            limiter: None,
            retry: RetryPolicy::none(),
            counters: Arc::new(Counters::default()),
            shutdown_tx,
            inner: Mutex::new(SchedulerInner {
                state: SchedulerState::Stopped,
                shutdown_requested: false,
                current_task: None,
                cleanup_callbacks: Vec::new(),
                last_triggered: None,
                abandoned_tasks: 0,
            }),
        })
    }

    /// Create a scheduler from the `[schedule]` section.
    pub fn from_config(task: T, config: &ScheduleConfig) -> Result<Self, SchedulerError> {
        Ok(Self::new(task, config.target_time()?, config.check_interval())?
            .with_shutdown_timeout(config.shutdown_timeout()))
    }
}

impl<T: PublishTask, C: Clock> Scheduler<T, C> {
    /// Replace the clock.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Scheduler<T, C2> {
        Scheduler {
            task: self.task,
            clock,
            target: self.target,
            check_interval: self.check_interval,
            shutdown_timeout: self.shutdown_timeout,
            limiter: self.limiter,
            retry: self.retry,
            counters: self.counters,
            shutdown_tx: self.shutdown_tx,
            inner: self.inner,
        }
    }

    /// Acquire a permit from `limiter` before every execution.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Run executions under `policy`.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Grace period used by [`stop`](Self::stop) and signal handling.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The scheduled task.
    pub fn task(&self) -> &Arc<T> {
        &self.task
    }

    /// Launch the bootstrap execution, then poll until shutdown.
    ///
    /// Returns once [`shutdown`](Self::shutdown) has been requested. Task
    /// failures are logged and never end the loop.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if the scheduler is not stopped.
    #[instrument(skip(self), fields(task = self.task.name(), target = %self.target))]
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut shutdown_rx = {
            let mut inner = self.inner.lock();
            if inner.state != SchedulerState::Stopped {
                return Err(SchedulerError::new(SchedulerErrorKind::AlreadyRunning));
            }
            inner.state = SchedulerState::Starting;
            inner.shutdown_requested = false;
            self.shutdown_tx.send_replace(false);
            self.shutdown_tx.subscribe()
        };

        info!(
            check_interval_seconds = self.check_interval.as_secs(),
            "Scheduler starting"
        );

        self.launch("bootstrap");

        {
            let mut inner = self.inner.lock();
            if inner.state == SchedulerState::Starting {
                inner.state = SchedulerState::Running;
            }
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.wait_for(|requested| *requested) => break,
                _ = tokio::time::sleep(self.check_interval) => {}
            }
            if !self.inner.lock().accepts_launches() {
                break;
            }
            self.check_schedule();
        }

        info!("Scheduler loop exited");
        Ok(())
    }

    /// Launch the task if the clock has reached today's target minute.
    fn check_schedule(&self) {
        let now = self.clock.now();
        if !self.target.matches(now) {
            return;
        }
        let today = now.date();

        let mut inner = self.inner.lock();
        if inner.last_triggered == Some(today) {
            return;
        }
        inner.last_triggered = Some(today);

        if inner.task_in_flight() {
            info!(%now, "Target time reached but previous execution still running, skipping");
            return;
        }

        info!(%now, "Target time reached, launching publish task");
        self.spawn_locked(&mut inner, "scheduled", None);
    }

    /// Launch an execution unless one is in flight.
    fn launch(&self, trigger: &'static str) -> bool {
        let mut inner = self.inner.lock();
        if !inner.accepts_launches() {
            debug!(trigger, "Scheduler not running, launch ignored");
            return false;
        }
        if inner.task_in_flight() {
            info!(trigger, "Previous execution still running, skipping");
            return false;
        }
        self.spawn_locked(&mut inner, trigger, None);
        true
    }

    fn spawn_locked(
        &self,
        inner: &mut SchedulerInner,
        trigger: &'static str,
        reply: Option<oneshot::Sender<Outcome>>,
    ) {
        let task = Arc::clone(&self.task);
        let limiter = self.limiter.clone();
        let retry = self.retry.clone();
        let counters = Arc::clone(&self.counters);
        let started = self.clock.now();
        let (done_tx, done) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let outcome = execute(task, limiter, retry, &counters).await;
            match &outcome {
                Ok(report) => info!(
                    trigger,
                    %started,
                    due = report.due,
                    published = report.published,
                    failed = report.failed,
                    skipped = report.skipped,
                    "Publish task finished"
                ),
                Err(e) => {
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    error!(trigger, %started, error = %e, "Publish task failed");
                }
            }
            done_tx.send_replace(true);
            if let Some(reply) = reply {
                let _ = reply.send(outcome);
            }
        });
        inner.current_task = Some(Execution { handle, done });
    }

    /// Execute the task now, outside the polling loop, and wait for it.
    ///
    /// Works whether or not the scheduler is running, and respects
    /// single-flight.
    ///
    /// # Errors
    ///
    /// Returns `TaskInFlight` if an execution is already running,
    /// `ShuttingDown` during shutdown, `Task` when the task fails and
    /// `TaskAborted` when it panics.
    #[instrument(skip(self), fields(task = self.task.name()))]
    pub async fn run_once(&self) -> Result<PublishReport, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock();
            if inner.state == SchedulerState::ShuttingDown {
                return Err(SchedulerError::new(SchedulerErrorKind::ShuttingDown));
            }
            if inner.task_in_flight() {
                return Err(SchedulerError::new(SchedulerErrorKind::TaskInFlight));
            }
            self.spawn_locked(&mut inner, "manual", Some(tx));
        }
        rx.await.map_err(|_| {
            SchedulerError::new(SchedulerErrorKind::TaskAborted(
                "execution ended without reporting".to_string(),
            ))
        })?
    }

    /// Stop polling, wait up to `timeout` for the in-flight execution, run
    /// cleanup callbacks in registration order, then release task resources.
    ///
    /// Does nothing if the scheduler is not running. An execution still
    /// running after `timeout` is left to finish on its own and counted as
    /// abandoned. Failing or panicking callbacks are logged and skipped.
    #[instrument(skip(self), fields(task = self.task.name()))]
    pub async fn shutdown(&self, timeout: Duration) {
        let in_flight = {
            let mut inner = self.inner.lock();
            if !inner.accepts_launches() {
                info!(state = %inner.state, "Scheduler not running, nothing to shut down");
                return;
            }
            inner.state = SchedulerState::ShuttingDown;
            inner.shutdown_requested = true;
            self.shutdown_tx.send_replace(true);
            inner
                .current_task
                .as_ref()
                .filter(|execution| !execution.handle.is_finished())
                .map(|execution| execution.done.clone())
        };

        info!(timeout_seconds = timeout.as_secs(), "Shutting down scheduler");

        // The execution stays registered while we wait so it still counts as in flight.
        let finished = match in_flight {
            Some(mut done) => {
                info!("Waiting for in-flight execution");
                tokio::time::timeout(timeout, done.wait_for(|finished| *finished))
                    .await
                    .is_ok()
            }
            None => true,
        };

        let execution = self.inner.lock().current_task.take();
        if finished {
            if let Some(execution) = execution {
                match execution.handle.await {
                    Ok(()) => debug!("In-flight execution finished"),
                    Err(e) => warn!(error = %e, "In-flight execution ended abnormally"),
                }
            }
        } else {
            let abandoned = {
                let mut inner = self.inner.lock();
                inner.abandoned_tasks += 1;
                inner.abandoned_tasks
            };
            warn!(
                timeout_seconds = timeout.as_secs(),
                abandoned,
                "Execution did not finish in time, abandoning it"
            );
        }

        let callbacks = std::mem::take(&mut self.inner.lock().cleanup_callbacks);
        let total = callbacks.len();
        for (index, callback) in callbacks.into_iter().enumerate() {
            match std::panic::catch_unwind(AssertUnwindSafe(callback)) {
                Ok(Ok(())) => debug!(index, total, "Cleanup callback finished"),
                Ok(Err(e)) => error!(index, error = %e, "Cleanup callback failed"),
                Err(panic) => error!(
                    index,
                    panic = %panic_message(panic.as_ref()),
                    "Cleanup callback panicked"
                ),
            }
        }

        self.task.cleanup().await;

        self.inner.lock().state = SchedulerState::Stopped;
        info!("Scheduler stopped");
    }

    /// [`shutdown`](Self::shutdown) with the configured grace period.
    pub async fn stop(&self) {
        self.shutdown(self.shutdown_timeout).await;
    }

    /// Register a callback to run during shutdown.
    ///
    /// Callbacks run once, in registration order.
    pub fn add_cleanup_callback<F>(&self, callback: F)
    where
        F: FnOnce() -> Result<(), SchedulerError> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.state == SchedulerState::ShuttingDown {
            warn!("Cleanup callback registered during shutdown may not run");
        }
        inner.cleanup_callbacks.push(Box::new(callback));
    }

    /// Current state snapshot.
    pub fn status(&self) -> SchedulerStatus {
        let inner = self.inner.lock();
        SchedulerStatus {
            state: inner.state,
            running: inner.accepts_launches(),
            shutdown_requested: inner.shutdown_requested,
            target_time: self.target.to_string(),
            check_interval_seconds: self.check_interval.as_secs(),
            task_in_flight: inner.task_in_flight(),
            cleanup_callbacks: inner.cleanup_callbacks.len(),
            abandoned_tasks: inner.abandoned_tasks,
            last_triggered: inner.last_triggered,
            executions: self.counters.executions.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Whether the scheduler is starting or running.
    pub fn is_running(&self) -> bool {
        self.inner.lock().accepts_launches()
    }

    /// The scheduler's current wall-clock reading.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Stop the scheduler when the process receives a termination signal.
    pub fn spawn_signal_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let signal = crate::wait_for_termination().await;
            info!(signal, "Stopping scheduler on signal");
            scheduler.stop().await;
        })
    }
}

/// One guarded execution: rate-limit permit, retry policy, panic isolation.
async fn execute<T: PublishTask>(
    task: Arc<T>,
    limiter: Option<RateLimiter>,
    retry: RetryPolicy,
    counters: &Counters,
) -> Outcome {
    if let Some(limiter) = &limiter {
        limiter.wait_if_needed().await;
    }
    counters.executions.fetch_add(1, Ordering::Relaxed);

    let attempt = retry.run(task.name(), || task.run());
    match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(result) => result.map_err(SchedulerError::from),
        Err(panic) => Err(SchedulerError::new(SchedulerErrorKind::TaskAborted(
            panic_message(panic.as_ref()),
        ))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
