use std::sync::Arc;

use async_trait::async_trait;
use control_plane_client::prelude::ControlPlaneClient;
use harness_bridge_core::prelude::LoadEngine;
use harness_bridge_instruments::MetricsSnapshotBuilder;
use harness_bridge_model::{RunContext, StopReason};
use tokio::sync::Mutex;

use crate::context::RunContextStore;
use crate::events::LifecycleListener;
use crate::scheduler::BackgroundTaskScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Started,
    Stopped,
}

#[derive(Debug)]
enum Phase {
    NotStarted,
    Started {
        context: Arc<RunContext>,
        enabled: bool,
    },
    Stopped,
}

/// Drives the control-plane side of a load test from the engine's start and stop events.
///
/// On start it captures the run context, notifies the control plane and starts the background
/// activities. On stop it cancels those activities, takes a final snapshot and notifies the control
/// plane with the reason the run stopped. No failure is ever passed back to the engine.
pub struct LifecycleCoordinator {
    contexts: Arc<RunContextStore>,
    client: Arc<ControlPlaneClient>,
    engine: Arc<dyn LoadEngine>,
    scheduler: BackgroundTaskScheduler,
    // Held for the whole of each transition, so that a stop waits for a start in progress.
    phase: Mutex<Phase>,
}

impl LifecycleCoordinator {
    pub fn new(
        contexts: Arc<RunContextStore>,
        client: Arc<ControlPlaneClient>,
        engine: Arc<dyn LoadEngine>,
        scheduler: BackgroundTaskScheduler,
    ) -> Self {
        Self {
            contexts,
            client,
            engine,
            scheduler,
            phase: Mutex::new(Phase::NotStarted),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        match *self.phase.lock().await {
            Phase::NotStarted => LifecycleState::NotStarted,
            Phase::Started { .. } => LifecycleState::Started,
            Phase::Stopped => LifecycleState::Stopped,
        }
    }

    pub fn scheduler(&self) -> &BackgroundTaskScheduler {
        &self.scheduler
    }

    pub async fn handle_test_start(&self) {
        let mut phase = self.phase.lock().await;
        if let Phase::Started { context, .. } = &*phase {
            log::warn!(
                "Ignoring test start, run {} is already in progress",
                context.run_id
            );
            return;
        }

        let context = self.contexts.seal();
        log::info!(
            "Test starting. Control Plane URL: [{}], Run ID: [{}]",
            self.client.base_url(),
            context.run_id
        );

        let enabled = self.client.is_enabled_for(&context);
        if enabled {
            // Failures are logged by the client, the test goes ahead regardless.
            let _ = self.client.notify_start(&context).await;

            if let Err(e) = self.scheduler.start(context.clone()) {
                log::error!("Failed to start background tasks: {e}");
            }
        } else if !self.client.is_configured() {
            log::warn!("Control plane integration not configured, skipping test start notification and background tasks");
        } else {
            log::warn!("Run id is not set in the run context, skipping test start notification and background tasks");
        }

        *phase = Phase::Started { context, enabled };
    }

    pub async fn handle_test_stop(&self) {
        let mut phase = self.phase.lock().await;
        let (context, enabled) = match &*phase {
            Phase::Started { context, enabled } => (context.clone(), *enabled),
            _ => {
                log::warn!("Ignoring test stop, no run is in progress");
                return;
            }
        };

        // Background tasks must be gone before the final snapshot so that nothing is pushed after
        // the stop notification.
        let stop_reason: StopReason = self.scheduler.stop().await;

        if enabled {
            let final_metrics = MetricsSnapshotBuilder::new(self.engine.as_ref()).build();
            let _ = self
                .client
                .notify_stop(&context, &final_metrics, stop_reason)
                .await;
        } else {
            log::warn!("Control plane integration not enabled for this run, skipping test stop notification");
        }

        *phase = Phase::Stopped;
        self.contexts.unseal();
        log::info!("Run {} finished ({stop_reason})", context.run_id);
    }
}

#[async_trait]
impl LifecycleListener for LifecycleCoordinator {
    async fn on_test_start(&self) {
        self.handle_test_start().await;
    }

    async fn on_test_stop(&self) {
        self.handle_test_stop().await;
    }
}
