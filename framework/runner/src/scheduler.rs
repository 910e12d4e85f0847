use std::sync::Arc;
use std::time::Duration;

use control_plane_client::prelude::ControlPlaneClient;
use harness_bridge_core::prelude::LoadEngine;
use harness_bridge_instruments::MetricsSnapshotBuilder;
use harness_bridge_model::{RunContext, StopReason};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The background activities that run alongside a load test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    MetricsPusher,
    DurationMonitor,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::MetricsPusher => write!(f, "metrics pusher"),
            TaskKind::DurationMonitor => write!(f, "duration monitor"),
        }
    }
}

/// Handle to one running background activity.
///
/// The handle is the only way to reach the task. Cancelling is idempotent and does not wait, use
/// [BackgroundTaskHandle::join] to wait for the task to be gone.
#[derive(Debug)]
pub struct BackgroundTaskHandle {
    kind: TaskKind,
    token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl BackgroundTaskHandle {
    fn spawn<F>(kind: TaskKind, token: CancellationToken, task: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            kind,
            token,
            join_handle: tokio::spawn(task),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Interrupt the task. Safe to call on a task that has finished or was already cancelled.
    ///
    /// The task is aborted at its next suspension point, which includes a request that is in
    /// flight, so it cannot touch shared state once it has been told to stop.
    pub fn cancel(&self) {
        self.token.cancel();
        self.join_handle.abort();
    }

    /// Wait for the task to complete.
    pub async fn join(self) {
        match self.join_handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => log::error!("Background {} failed: {e}", self.kind),
        }
    }
}

/// Records whether the duration monitor stopped the run.
///
/// Firing and disarming exclude each other, so either the monitor stops the run and the stop is
/// reported as automatic, or the run was already stopping and the monitor does nothing.
#[derive(Debug, Default)]
struct AutoStopLatch {
    state: Mutex<LatchState>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum LatchState {
    #[default]
    Armed,
    Fired,
    Disarmed,
}

impl AutoStopLatch {
    fn fire(&self) -> bool {
        let mut state = self.state.lock();
        if *state == LatchState::Armed {
            *state = LatchState::Fired;
            true
        } else {
            false
        }
    }

    fn disarm(&self) -> StopReason {
        let mut state = self.state.lock();
        match *state {
            LatchState::Fired => StopReason::AutoStoppedByDuration,
            LatchState::Armed | LatchState::Disarmed => {
                *state = LatchState::Disarmed;
                StopReason::Manual
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Background tasks are already running for run {0}, stop them before starting again")]
    AlreadyRunning(String),
}

#[derive(Debug)]
enum SchedulerInner {
    Idle,
    Running(ActiveRun),
    Stopped,
}

#[derive(Debug)]
struct ActiveRun {
    run_id: String,
    tasks: Vec<BackgroundTaskHandle>,
    auto_stop: Arc<AutoStopLatch>,
}

/// Owns the background activities for the current run: the metrics pusher and the duration
/// monitor.
///
/// Both are started together by [BackgroundTaskScheduler::start] and stopped together by
/// [BackgroundTaskScheduler::stop]. A new run can be started once the previous one has been
/// stopped.
pub struct BackgroundTaskScheduler {
    engine: Arc<dyn LoadEngine>,
    client: Arc<ControlPlaneClient>,
    push_interval: Duration,
    inner: Mutex<SchedulerInner>,
}

impl BackgroundTaskScheduler {
    pub fn new(
        engine: Arc<dyn LoadEngine>,
        client: Arc<ControlPlaneClient>,
        push_interval: Duration,
    ) -> Self {
        Self {
            engine,
            client,
            push_interval,
            inner: Mutex::new(SchedulerInner::Idle),
        }
    }

    pub fn state(&self) -> SchedulerState {
        match *self.inner.lock() {
            SchedulerInner::Idle => SchedulerState::Idle,
            SchedulerInner::Running(_) => SchedulerState::Running,
            SchedulerInner::Stopped => SchedulerState::Stopped,
        }
    }

    /// The kinds of the tasks that are still running.
    pub fn live_tasks(&self) -> Vec<TaskKind> {
        match &*self.inner.lock() {
            SchedulerInner::Running(run) => run
                .tasks
                .iter()
                .filter(|t| !t.is_finished())
                .map(|t| t.kind())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Start the background activities for a run.
    ///
    /// The duration monitor is only started if the run has a positive duration limit. Must be
    /// called from within a Tokio runtime.
    pub fn start(&self, context: Arc<RunContext>) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock();
        if let SchedulerInner::Running(run) = &*inner {
            return Err(SchedulerError::AlreadyRunning(run.run_id.clone()));
        }

        let auto_stop = Arc::new(AutoStopLatch::default());
        let mut tasks = Vec::with_capacity(2);

        let token = CancellationToken::new();
        tasks.push(BackgroundTaskHandle::spawn(
            TaskKind::MetricsPusher,
            token.clone(),
            run_metrics_pusher(
                self.engine.clone(),
                self.client.clone(),
                context.clone(),
                self.push_interval,
                token,
            ),
        ));
        log::info!("Metrics pusher spawned for run {}", context.run_id);

        match context.duration_limit() {
            Some(limit) => {
                let token = CancellationToken::new();
                tasks.push(BackgroundTaskHandle::spawn(
                    TaskKind::DurationMonitor,
                    token.clone(),
                    run_duration_monitor(self.engine.clone(), auto_stop.clone(), limit, token),
                ));
                log::info!("Duration monitor spawned for run {}", context.run_id);
            }
            None => log::info!("No duration limit set, duration monitor disabled"),
        }

        *inner = SchedulerInner::Running(ActiveRun {
            run_id: context.run_id.clone(),
            tasks,
            auto_stop,
        });

        Ok(())
    }

    /// Stop the background activities and wait for them to be gone.
    ///
    /// Returns why the run stopped. Calling this when nothing is running does nothing and reports
    /// a manual stop.
    pub async fn stop(&self) -> StopReason {
        let run = {
            let mut inner = self.inner.lock();
            match std::mem::replace(&mut *inner, SchedulerInner::Stopped) {
                SchedulerInner::Running(run) => run,
                previous => {
                    *inner = previous;
                    return StopReason::Manual;
                }
            }
        };

        // Disarm first so that the duration monitor cannot stop the run once stopping has begun.
        let stop_reason = run.auto_stop.disarm();

        for task in &run.tasks {
            log::info!("Stopping {} for run {}", task.kind(), run.run_id);
            task.cancel();
        }
        for task in run.tasks {
            task.join().await;
        }

        log::debug!("Background tasks stopped for run {}", run.run_id);

        stop_reason
    }
}

async fn run_metrics_pusher(
    engine: Arc<dyn LoadEngine>,
    client: Arc<ControlPlaneClient>,
    context: Arc<RunContext>,
    interval: Duration,
    token: CancellationToken,
) {
    log::info!(
        "Metrics pusher started for run {}, pushing every {} seconds",
        context.run_id,
        interval.as_secs_f64()
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        log::debug!("Collecting metrics for run {}", context.run_id);
        let snapshot = MetricsSnapshotBuilder::new(engine.as_ref()).build();

        // A failed push is logged by the client and the loop carries on.
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = client.push_metrics(&context, &snapshot) => {}
        }
    }

    log::info!("Metrics pusher stopped for run {}", context.run_id);
}

async fn run_duration_monitor(
    engine: Arc<dyn LoadEngine>,
    auto_stop: Arc<AutoStopLatch>,
    limit: Duration,
    token: CancellationToken,
) {
    log::info!(
        "Duration monitor started: will stop test after {} seconds",
        limit.as_secs()
    );

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            log::info!("Duration monitor cancelled before the duration elapsed");
            return;
        }
        _ = tokio::time::sleep(limit) => {}
    }

    if auto_stop.fire() {
        log::info!(
            "Duration of {} seconds has elapsed, stopping test (auto-stop)",
            limit.as_secs()
        );
        engine.stop_run();
    }
}
