use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Identifies one load-test execution.
///
/// The orchestrator pushes this to the worker before it starts a run. Once the run starts the
/// bridge works from a captured copy, so later changes only affect the next run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    /// The run id assigned by the orchestrator
    ///
    /// An empty run id disables the control-plane integration for the run.
    pub run_id: String,
    /// The tenant that owns the run. Opaque, may be empty.
    pub tenant_id: String,
    /// The environment the run targets. Opaque, may be empty.
    pub env_id: String,
    /// The maximum duration of the run, in seconds
    ///
    /// When this is not set, or is not positive, the run is never stopped automatically.
    pub duration_seconds: Option<i64>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn with_env_id(mut self, env_id: impl Into<String>) -> Self {
        self.env_id = env_id.into();
        self
    }

    pub fn with_duration_seconds(mut self, duration_seconds: Option<i64>) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    pub fn has_run_id(&self) -> bool {
        !self.run_id.is_empty()
    }

    /// The duration after which the run should be stopped, if any.
    pub fn duration_limit(&self) -> Option<Duration> {
        self.duration_seconds
            .and_then(|s| u64::try_from(s).ok())
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}

/// Why a run stopped. Recorded once per run, when the stop event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Stopped by an operator or by the engine itself.
    Manual,
    /// Stopped because the configured duration elapsed.
    AutoStoppedByDuration,
}

impl StopReason {
    pub fn is_auto_stopped(&self) -> bool {
        matches!(self, StopReason::AutoStoppedByDuration)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Manual => write!(f, "manual"),
            StopReason::AutoStoppedByDuration => write!(f, "auto"),
        }
    }
}

/// Point-in-time copy of the engine's counters, in the reporting wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// RFC 3339 UTC timestamp, for example `2024-05-01T10:00:00.000Z`
    pub timestamp: String,
    /// Current requests per second across all endpoints
    pub total_rps: f64,
    pub total_requests: u64,
    pub total_failures: u64,
    /// Failed requests as a percentage of all requests
    ///
    /// This is `0.0` when there have been no requests.
    #[serde(rename = "errorRate")]
    pub error_rate_percent: f64,
    pub avg_response_ms: f64,
    pub p50_response_ms: f64,
    pub p95_response_ms: f64,
    pub p99_response_ms: f64,
    pub current_users: u64,
    /// Statistics for each endpoint, keyed by `<method>:<name>`
    ///
    /// The aggregate entry reported by the engine is never included here.
    #[serde(rename = "requestStats")]
    pub per_endpoint: BTreeMap<String, EndpointStat>,
}

/// Statistics for one endpoint at snapshot time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStat {
    pub method: String,
    pub name: String,
    pub num_requests: u64,
    pub num_failures: u64,
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub median_response_time: f64,
    #[serde(rename = "requestsPerSec")]
    pub requests_per_second: f64,
}

impl EndpointStat {
    /// The key this endpoint is stored under in [MetricsSnapshot::per_endpoint].
    pub fn key(method: &str, name: &str) -> String {
        format!("{method}:{name}")
    }
}

/// Body of the test-start notification.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStartPayload<'a> {
    pub run_id: &'a str,
    pub tenant_id: &'a str,
    pub env_id: &'a str,
}

impl<'a> From<&'a RunContext> for TestStartPayload<'a> {
    fn from(context: &'a RunContext) -> Self {
        Self {
            run_id: &context.run_id,
            tenant_id: &context.tenant_id,
            env_id: &context.env_id,
        }
    }
}

/// Body of the test-stop notification.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStopPayload<'a> {
    pub run_id: &'a str,
    pub tenant_id: &'a str,
    pub env_id: &'a str,
    pub final_metrics: &'a MetricsSnapshot,
    pub auto_stopped: bool,
}

impl<'a> TestStopPayload<'a> {
    pub fn new(
        context: &'a RunContext,
        final_metrics: &'a MetricsSnapshot,
        stop_reason: StopReason,
    ) -> Self {
        Self {
            run_id: &context.run_id,
            tenant_id: &context.tenant_id,
            env_id: &context.env_id,
            final_metrics,
            auto_stopped: stop_reason.is_auto_stopped(),
        }
    }
}

/// Body of a periodic metrics push.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPushPayload<'a> {
    pub run_id: &'a str,
    pub metrics: &'a MetricsSnapshot,
}
