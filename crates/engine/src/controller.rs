//! Per-job controller: start/stop commands and the status poll loop.
//!
//! [`JobController`] owns exactly one job kind.  While the job is
//! running it keeps at most one poll task alive; the task ticks every
//! [`ControllerConfig::poll_interval`], fetches the remote status,
//! merges new log entries into the [`StatusStore`], and releases itself
//! once the remote reports the run finished.
//!
//! The remote is authoritative for `running`: `start` and `stop` set it
//! optimistically, and every successful poll overwrites it.

use std::sync::Arc;
use std::time::Duration;

use jobwatch_core::{
    reconcile, JobKind, LogEntry, RemoteLogEntry, Severity, StatusSnapshot, StatusStore,
};
use jobwatch_remote::{JobService, RemoteError, StatusResponse};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::JobEvent;
use crate::phase::JobPhase;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long `shutdown` waits for the poll task to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Broadcast channel capacity for controller events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tunables for a [`JobController`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    /// Bound on the status log.
    pub max_entries: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_entries: jobwatch_core::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Tracks one remote job.  Dropping the controller cancels its poll task.
pub struct JobController {
    inner: Arc<Inner>,
}

struct Inner {
    kind: JobKind,
    service: Arc<dyn JobService>,
    status: RwLock<StatusStore>,
    run: Mutex<RunState>,
    poll_interval: Duration,
    event_tx: broadcast::Sender<JobEvent>,
    /// Master token; every poll task runs under a child of it.
    cancel: CancellationToken,
}

#[derive(Default)]
struct RunState {
    running: bool,
    phase: JobPhase,
    poller: Option<Poller>,
    /// Incremented for every spawned poll task.
    epoch: u64,
    /// Incremented by every `start`.  Status fetched under an older
    /// generation describes a previous run and is dropped.
    generation: u64,
}

/// The single owned poll task of a controller.
struct Poller {
    epoch: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// The run and poll task a status request was issued under.
#[derive(Debug, Clone, Copy)]
struct Issued {
    generation: u64,
    /// `None` for requests made outside the poll task.
    epoch: Option<u64>,
}

/// What a poll tick asks of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    /// The run finished or this task was superseded.
    Exit,
}

impl JobController {
    pub fn new(kind: JobKind, service: Arc<dyn JobService>, config: ControllerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                kind,
                service,
                status: RwLock::new(StatusStore::new(config.max_entries)),
                run: Mutex::new(RunState::default()),
                poll_interval: config.poll_interval,
                event_tx,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.inner.kind
    }

    /// Subscribe to log and lifecycle events for this job.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.event_tx.subscribe()
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.status.read().await.snapshot()
    }

    pub async fn is_running(&self) -> bool {
        self.inner.run.lock().await.running
    }

    pub async fn phase(&self) -> JobPhase {
        self.inner.run.lock().await.phase
    }

    /// Whether a poll task is currently owned.
    pub async fn is_polling(&self) -> bool {
        self.inner.run.lock().await.poller.is_some()
    }

    /// Start a new run.
    ///
    /// The previous run's log is discarded.  On success the poll task is
    /// started (unless one is already owned); on failure `running` is
    /// rolled back and the error is both logged as an entry and returned.
    pub async fn start(&self, payload: &serde_json::Value) -> Result<(), RemoteError> {
        let inner = &self.inner;
        let kind = inner.kind;

        {
            let mut run = inner.run.lock().await;
            run.generation += 1;
            inner
                .append(
                    format!("Preparing {}...", kind.label().to_lowercase()),
                    Severity::Loading,
                    true,
                )
                .await;
            run.phase = JobPhase::Starting;
            inner.set_running(&mut run, true);
        }

        tracing::info!(job = %kind, "Starting remote job");

        match inner.service.start(kind, payload).await {
            Ok(ack) => {
                inner.append(ack, kind.phase_severity(), false).await;
                {
                    let mut run = inner.run.lock().await;
                    if run.phase == JobPhase::Starting {
                        run.phase = JobPhase::Running;
                    }
                }
                Inner::ensure_polling(inner).await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(job = %kind, error = %e, "Start request failed");
                inner
                    .append(
                        format!("Failed to start {}: {e}", kind.label().to_lowercase()),
                        Severity::Error,
                        false,
                    )
                    .await;
                let mut run = inner.run.lock().await;
                inner.set_running(&mut run, false);
                run.phase = JobPhase::Idle;
                Err(e)
            }
        }
    }

    /// Ask the remote to stop the current run.
    ///
    /// A no-op (one info entry, no request) when the job is not running.
    /// On success `running` is cleared locally; the next poll confirms.
    pub async fn stop(&self) -> Result<(), RemoteError> {
        let inner = &self.inner;
        let kind = inner.kind;

        let running = inner.run.lock().await.running;
        if !running {
            inner
                .append(format!("{} is not running", kind.label()), Severity::Info, false)
                .await;
            return Ok(());
        }

        inner.run.lock().await.phase = JobPhase::Stopping;
        inner
            .append("Requesting stop...", Severity::Loading, false)
            .await;

        tracing::info!(job = %kind, "Stopping remote job");

        match inner.service.stop(kind).await {
            Ok(confirmation) => {
                inner.append(confirmation, Severity::Info, false).await;
                let mut run = inner.run.lock().await;
                inner.set_running(&mut run, false);
                if run.poller.is_none() {
                    run.phase = JobPhase::Idle;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(job = %kind, error = %e, "Stop request failed");
                inner
                    .append(
                        format!("Failed to stop {}: {e}", kind.label().to_lowercase()),
                        Severity::Error,
                        false,
                    )
                    .await;
                let mut run = inner.run.lock().await;
                if run.phase == JobPhase::Stopping {
                    run.phase = JobPhase::Running;
                }
                Err(e)
            }
        }
    }

    /// Fetch the remote status once and adopt a run that is already in
    /// progress (e.g. started before this process).  Fetch failures are
    /// only logged.
    pub async fn attach(&self) {
        let inner = &self.inner;
        let kind = inner.kind;

        let generation = inner.run.lock().await.generation;
        let status = match inner.service.status(kind).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(job = %kind, error = %e, "Initial status fetch failed");
                return;
            }
        };

        if !status.running {
            tracing::debug!(job = %kind, "Remote job idle at attach");
            return;
        }

        {
            let mut run = inner.run.lock().await;
            if run.generation != generation || run.poller.is_some() {
                tracing::debug!(job = %kind, "Run started while attaching, not adopting");
                return;
            }
            run.phase = JobPhase::Running;
            inner.set_running(&mut run, true);
            // The whole remote history of the adopted run is imported.
            inner.merge_remote(&status.log, true).await;
        }

        inner
            .append(
                format!("{} is already running, resuming status sync", kind.label()),
                Severity::Info,
                false,
            )
            .await;
        Inner::ensure_polling(inner).await;
    }

    /// Run one poll immediately, outside the timer.
    ///
    /// Transport and parse failures are returned to the caller here
    /// (the timer-driven loop only logs them).
    pub async fn poll_once(&self) -> Result<(), RemoteError> {
        let generation = self.inner.run.lock().await.generation;
        let status = self.inner.service.status(self.inner.kind).await?;
        self.inner
            .apply_status(
                status,
                Issued {
                    generation,
                    epoch: None,
                },
            )
            .await;
        Ok(())
    }

    /// Cancel the poll task and wait briefly for it to exit.  The
    /// controller stops observing; the remote job is not touched.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.cancel.cancel();

        let poller = inner.run.lock().await.poller.take();
        if let Some(poller) = poller {
            poller.cancel.cancel();
            if tokio::time::timeout(SHUTDOWN_GRACE, poller.task).await.is_err() {
                tracing::warn!(job = %inner.kind, "Poll task did not exit within grace period");
            }
        }

        tracing::info!(job = %inner.kind, "Controller shut down");
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl Inner {
    async fn append(&self, message: impl Into<String>, severity: Severity, clear_previous: bool) {
        let entry = self
            .status
            .write()
            .await
            .append(message, severity, clear_previous);
        self.emit_log(entry);
    }

    /// Reconcile remote entries into the store and broadcast the new ones.
    /// With `whole_history` the local log is not used as a baseline, so
    /// every remote entry is considered new.
    async fn merge_remote(&self, remote: &[RemoteLogEntry], whole_history: bool) {
        let merged = {
            let mut store = self.status.write().await;
            let merged = if whole_history {
                reconcile(std::iter::empty(), remote)
            } else {
                reconcile(store.log(), remote)
            };
            for entry in &merged {
                store.push(entry.clone());
            }
            merged
        };
        if !merged.is_empty() {
            tracing::debug!(job = %self.kind, count = merged.len() - 1, "Merged remote log entries");
        }
        for entry in merged {
            self.emit_log(entry);
        }
    }

    fn emit_log(&self, entry: LogEntry) {
        // No subscribers is fine.
        let _ = self.event_tx.send(JobEvent::LogAppended {
            job: self.kind,
            entry,
        });
    }

    fn set_running(&self, run: &mut RunState, running: bool) {
        if run.running != running {
            run.running = running;
            let _ = self.event_tx.send(JobEvent::RunningChanged {
                job: self.kind,
                running,
            });
        }
    }

    /// Spawn the poll task if the job is running and none is owned.
    async fn ensure_polling(this: &Arc<Self>) {
        let mut run = this.run.lock().await;
        if !run.running || run.poller.is_some() || this.cancel.is_cancelled() {
            return;
        }

        run.epoch += 1;
        let epoch = run.epoch;
        let cancel = this.cancel.child_token();
        let task = tokio::spawn(poll_loop(Arc::clone(this), epoch, cancel.clone()));
        run.poller = Some(Poller {
            epoch,
            cancel,
            task,
        });

        tracing::debug!(job = %this.kind, epoch, "Poll task started");
    }

    /// One timer tick of poll task `epoch`.
    async fn poll_tick(&self, epoch: u64, cancel: &CancellationToken) -> TickOutcome {
        let generation = self.run.lock().await.generation;
        let status = match self.service.status(self.kind).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(job = %self.kind, error = %e, "Status poll failed, retrying next tick");
                return TickOutcome::Continue;
            }
        };

        if cancel.is_cancelled() {
            tracing::debug!(job = %self.kind, epoch, "Discarding status from cancelled poll task");
            return TickOutcome::Exit;
        }

        self.apply_status(
            status,
            Issued {
                generation,
                epoch: Some(epoch),
            },
        )
        .await
    }

    /// Reconcile a status response into local state.
    ///
    /// The response is dropped when its poll task is no longer the owned
    /// one, or when a new run was started after it was requested.
    async fn apply_status(&self, status: StatusResponse, issued: Issued) -> TickOutcome {
        let mut run = self.run.lock().await;
        if let Some(epoch) = issued.epoch {
            if run.poller.as_ref().map(|p| p.epoch) != Some(epoch) {
                tracing::debug!(job = %self.kind, epoch, "Discarding status from superseded poll task");
                return TickOutcome::Exit;
            }
        }
        if run.generation != issued.generation {
            tracing::debug!(
                job = %self.kind,
                generation = issued.generation,
                "Discarding status requested before the current run started",
            );
            return TickOutcome::Continue;
        }

        self.set_running(&mut run, status.running);
        self.merge_remote(&status.log, false).await;

        if status.running {
            return TickOutcome::Continue;
        }
        let Some(poller) = run.poller.take() else {
            return TickOutcome::Continue;
        };

        let with_errors = self.status.read().await.has_errors_since_reset();
        let (message, severity) = if with_errors {
            (format!("{} finished with errors", self.kind.label()), Severity::Error)
        } else {
            (format!("{} finished successfully", self.kind.label()), Severity::Success)
        };
        self.append(message, severity, false).await;

        // The handle is dropped, not awaited: the task may be the caller.
        poller.cancel.cancel();
        run.phase = JobPhase::Idle;

        tracing::info!(job = %self.kind, with_errors, "Remote job finished, polling stopped");
        let _ = self.event_tx.send(JobEvent::Finished {
            job: self.kind,
            with_errors,
        });

        TickOutcome::Exit
    }
}

/// Body of the poll task.  Ticks never overlap: each tick is awaited
/// before the next is taken, and late ticks are skipped rather than
/// bunched up.
async fn poll_loop(inner: Arc<Inner>, epoch: u64, cancel: CancellationToken) {
    let period = inner.poll_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if inner.poll_tick(epoch, &cancel).await == TickOutcome::Exit {
                    break;
                }
            }
        }
    }

    tracing::debug!(job = %inner.kind, epoch, "Poll task exited");
}
