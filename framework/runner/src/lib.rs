mod admin;
mod bridge;
mod config;
mod context;
mod events;
mod init;
mod lifecycle;
mod scheduler;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
mod test_support;

pub use init::init_logging;

pub mod prelude {
    pub use crate::admin::{
        AdminMethod, AdminResponse, AdminRoute, RunContextEndpoint, GET_CONTEXT_PATH,
        SET_CONTEXT_PATH,
    };
    pub use crate::bridge::{HarnessBridge, BRIDGE_LISTENER_NAME};
    pub use crate::config::{
        BridgeConfig, CONTROL_PLANE_TOKEN_ENV, CONTROL_PLANE_URL_ENV,
        DEFAULT_METRICS_PUSH_INTERVAL, DURATION_SECONDS_ENV, ENV_ID_ENV,
        METRICS_PUSH_INTERVAL_ENV, RUN_ID_ENV, TENANT_ID_ENV,
    };
    pub use crate::context::{ContextError, RunContextStore};
    pub use crate::events::{EventsError, LifecycleEvents, LifecycleListener};
    pub use crate::init::init_logging;
    pub use crate::lifecycle::{LifecycleCoordinator, LifecycleState};
    pub use crate::scheduler::{
        BackgroundTaskHandle, BackgroundTaskScheduler, SchedulerError, SchedulerState, TaskKind,
    };
}
