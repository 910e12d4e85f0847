use std::sync::Arc;

use anyhow::Context;
use control_plane_client::prelude::{ControlPlaneClient, HttpTransport, Transport};
use harness_bridge_core::prelude::LoadEngine;

use crate::admin::RunContextEndpoint;
use crate::config::BridgeConfig;
use crate::context::RunContextStore;
use crate::events::LifecycleEvents;
use crate::lifecycle::LifecycleCoordinator;
use crate::scheduler::BackgroundTaskScheduler;

/// The name the bridge subscribes to the engine's lifecycle events under.
pub const BRIDGE_LISTENER_NAME: &str = "control-plane-bridge";

/// The control-plane bridge, installed into a host engine.
pub struct HarnessBridge {
    contexts: Arc<RunContextStore>,
    coordinator: Arc<LifecycleCoordinator>,
    endpoint: RunContextEndpoint,
}

impl HarnessBridge {
    /// Build the bridge from its configuration and subscribe it to the engine's lifecycle events.
    pub fn install(
        config: BridgeConfig,
        engine: Arc<dyn LoadEngine>,
        events: &LifecycleEvents,
    ) -> anyhow::Result<Self> {
        Self::install_with_transport(config, engine, events, Arc::new(HttpTransport::new()))
    }

    pub fn install_with_transport(
        config: BridgeConfig,
        engine: Arc<dyn LoadEngine>,
        events: &LifecycleEvents,
        transport: Arc<dyn Transport>,
    ) -> anyhow::Result<Self> {
        let client = Arc::new(ControlPlaneClient::with_transport(
            config.control_plane_url,
            config.control_plane_token,
            transport,
        ));
        if !client.is_configured() {
            log::warn!("Control plane URL or token not set, control plane integration is disabled");
        }

        let contexts = Arc::new(RunContextStore::new(config.initial_context));
        let scheduler = BackgroundTaskScheduler::new(
            engine.clone(),
            client.clone(),
            config.metrics_push_interval,
        );
        let coordinator = Arc::new(LifecycleCoordinator::new(
            contexts.clone(),
            client,
            engine,
            scheduler,
        ));

        events
            .subscribe(BRIDGE_LISTENER_NAME, coordinator.clone())
            .context("Failed to subscribe the control plane bridge to lifecycle events")?;

        Ok(Self {
            endpoint: RunContextEndpoint::new(contexts.clone()),
            contexts,
            coordinator,
        })
    }

    pub fn endpoint(&self) -> &RunContextEndpoint {
        &self.endpoint
    }

    pub fn coordinator(&self) -> &Arc<LifecycleCoordinator> {
        &self.coordinator
    }

    pub fn contexts(&self) -> &Arc<RunContextStore> {
        &self.contexts
    }
}
