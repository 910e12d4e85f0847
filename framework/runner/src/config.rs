use std::time::Duration;

use harness_bridge_model::RunContext;

pub const CONTROL_PLANE_URL_ENV: &str = "CONTROL_PLANE_URL";
pub const CONTROL_PLANE_TOKEN_ENV: &str = "CONTROL_PLANE_TOKEN";
pub const METRICS_PUSH_INTERVAL_ENV: &str = "METRICS_PUSH_INTERVAL";
pub const RUN_ID_ENV: &str = "RUN_ID";
pub const TENANT_ID_ENV: &str = "TENANT_ID";
pub const ENV_ID_ENV: &str = "ENV_ID";
pub const DURATION_SECONDS_ENV: &str = "DURATION_SECONDS";

pub const DEFAULT_METRICS_PUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for the control-plane bridge, read once at boot.
///
/// Missing or invalid values never fail the worker. They disable the integration or fall back to a
/// default, with a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub control_plane_url: String,
    pub control_plane_token: String,
    pub metrics_push_interval: Duration,
    /// The run context before the orchestrator overrides it through the admin endpoint.
    pub initial_context: RunContext,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl BridgeConfig {
    pub fn new(control_plane_url: impl Into<String>, control_plane_token: impl Into<String>) -> Self {
        Self {
            control_plane_url: control_plane_url.into(),
            control_plane_token: control_plane_token.into(),
            metrics_push_interval: DEFAULT_METRICS_PUSH_INTERVAL,
            initial_context: RunContext::default(),
        }
    }

    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.metrics_push_interval = interval;
        self
    }

    pub fn with_initial_context(mut self, context: RunContext) -> Self {
        self.initial_context = context;
        self
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let metrics_push_interval = match var(METRICS_PUSH_INTERVAL_ENV).as_str() {
            "" => DEFAULT_METRICS_PUSH_INTERVAL,
            raw => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    log::warn!(
                        "Invalid {METRICS_PUSH_INTERVAL_ENV} [{raw}], using the default of {}s",
                        DEFAULT_METRICS_PUSH_INTERVAL.as_secs()
                    );
                    DEFAULT_METRICS_PUSH_INTERVAL
                }
            },
        };

        let duration_seconds = match var(DURATION_SECONDS_ENV).as_str() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    log::warn!("Invalid {DURATION_SECONDS_ENV} [{raw}], no duration limit will be applied");
                    None
                }
            },
        };

        let config = Self {
            control_plane_url: var(CONTROL_PLANE_URL_ENV),
            control_plane_token: var(CONTROL_PLANE_TOKEN_ENV),
            metrics_push_interval,
            initial_context: RunContext {
                run_id: var(RUN_ID_ENV),
                tenant_id: var(TENANT_ID_ENV),
                env_id: var(ENV_ID_ENV),
                duration_seconds,
            },
        };

        log::info!(
            "Control plane URL: [{}], token: {}, metrics push interval: {}s",
            config.control_plane_url,
            if config.control_plane_token.is_empty() { "not set" } else { "set" },
            config.metrics_push_interval.as_secs()
        );

        config
    }
}
