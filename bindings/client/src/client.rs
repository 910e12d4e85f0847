use std::sync::Arc;
use std::time::Duration;

use harness_bridge_model::{
    MetricsPushPayload, MetricsSnapshot, RunContext, StopReason, TestStartPayload,
    TestStopPayload,
};
use serde::Serialize;

use crate::error::{log_failure, ControlPlaneError};
use crate::transport::{HttpTransport, PostRequest, Transport};

pub const TEST_START_PATH: &str = "/v1/internal/locust/test-start";
pub const TEST_STOP_PATH: &str = "/v1/internal/locust/test-stop";
pub const METRICS_PATH: &str = "/v1/internal/locust/metrics";

pub const TOKEN_HEADER: &str = "X-Locust-Token";

pub const TEST_START_TIMEOUT: Duration = Duration::from_secs(10);
pub const TEST_STOP_TIMEOUT: Duration = Duration::from_secs(5);
pub const METRICS_TIMEOUT: Duration = Duration::from_secs(5);

/// Reports run lifecycle and metrics to the control plane.
///
/// Every call is a single authenticated POST. Failures are logged here and returned so that callers
/// can inspect them, but callers are expected to carry on regardless. Nothing is retried.
///
/// When the base URL or token is not configured, or the run has no id, each call logs a warning
/// and returns [ControlPlaneError::Disabled] without touching the network.
#[derive(Clone)]
pub struct ControlPlaneClient {
    base_url: String,
    token: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ControlPlaneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneClient")
            .field("base_url", &self.base_url)
            .field("token", &if self.token.is_empty() { "not set" } else { "set" })
            .finish()
    }
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_transport(base_url, token, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(
        base_url: impl Into<String>,
        token: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let base_url = base_url.into();
        let base_url = if !base_url.is_empty() && url::Url::parse(&base_url).is_err() {
            log::warn!("Ignoring invalid control plane URL [{base_url}]");
            String::new()
        } else {
            base_url.trim_end_matches('/').to_string()
        };

        Self {
            base_url,
            token: token.into(),
            transport,
        }
    }

    /// Whether both the base URL and the token are set.
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.token.is_empty()
    }

    /// Whether calls for this run will reach the control plane.
    pub fn is_enabled_for(&self, context: &RunContext) -> bool {
        self.is_configured() && context.has_run_id()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn notify_start(&self, context: &RunContext) -> Result<(), ControlPlaneError> {
        log::info!(
            "Test started, notifying control plane (RUN_ID={})",
            context.run_id
        );

        let result = self
            .post(
                context,
                TEST_START_PATH,
                &TestStartPayload::from(context),
                TEST_START_TIMEOUT,
            )
            .await;

        match &result {
            Ok(()) => log::info!("Successfully notified control plane of test start"),
            Err(e) => log_failure("notify test start", &context.run_id, e),
        }

        result
    }

    pub async fn notify_stop(
        &self,
        context: &RunContext,
        final_metrics: &MetricsSnapshot,
        stop_reason: StopReason,
    ) -> Result<(), ControlPlaneError> {
        log::info!(
            "Test stopped ({stop_reason}), notifying control plane with final metrics (RUN_ID={})",
            context.run_id
        );

        let result = self
            .post(
                context,
                TEST_STOP_PATH,
                &TestStopPayload::new(context, final_metrics, stop_reason),
                TEST_STOP_TIMEOUT,
            )
            .await;

        match &result {
            Ok(()) => log::info!("Successfully notified control plane of test stop"),
            Err(e) => log_failure("notify test stop", &context.run_id, e),
        }

        result
    }

    pub async fn push_metrics(
        &self,
        context: &RunContext,
        metrics: &MetricsSnapshot,
    ) -> Result<(), ControlPlaneError> {
        log::info!(
            "Pushing metrics for run {} (RPS: {:.2}, Requests: {}, Users: {})",
            context.run_id,
            metrics.total_rps,
            metrics.total_requests,
            metrics.current_users
        );

        let result = self
            .post(
                context,
                METRICS_PATH,
                &MetricsPushPayload {
                    run_id: &context.run_id,
                    metrics,
                },
                METRICS_TIMEOUT,
            )
            .await;

        match &result {
            Ok(()) => log::info!("Metrics pushed successfully for run {}", context.run_id),
            Err(e) => log_failure("push metrics", &context.run_id, e),
        }

        result
    }

    async fn post(
        &self,
        context: &RunContext,
        path: &str,
        payload: &impl Serialize,
        timeout: Duration,
    ) -> Result<(), ControlPlaneError> {
        if !self.is_configured() {
            return Err(ControlPlaneError::Disabled("missing control plane URL or token"));
        }
        if !context.has_run_id() {
            return Err(ControlPlaneError::Disabled("run id is not set"));
        }

        let response = self
            .transport
            .post_json(PostRequest {
                url: format!("{}{}", self.base_url, path),
                token: self.token.clone(),
                body: serde_json::to_value(payload)?,
                timeout,
            })
            .await?;

        if response.is_success() {
            Ok(())
        } else {
            Err(ControlPlaneError::Status {
                status: response.status,
                body: response.body,
            })
        }
    }
}
