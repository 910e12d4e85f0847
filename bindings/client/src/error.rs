use std::time::Duration;

/// Failure to exchange a request with the control plane at all.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection error: {0}")]
    Connection(String),
}

impl TransportError {
    /// Map a reqwest error, reporting timeouts with the timeout that was applied.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// The control plane URL or token is not configured, or the run has no id.
    #[error("Control plane integration disabled: {0}")]
    Disabled(&'static str),
    #[error("Control plane responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ControlPlaneError {
    pub fn is_disabled(&self) -> bool {
        matches!(self, ControlPlaneError::Disabled(_))
    }
}

/// Handle a failed control-plane call by logging it, so that it never reaches the load test.
pub(crate) fn log_failure(operation: &str, run_id: &str, err: &ControlPlaneError) {
    match err {
        ControlPlaneError::Disabled(reason) => {
            log::warn!("Control plane integration not configured ({reason}), skipping {operation}");
        }
        ControlPlaneError::Status { status, body } => {
            log::error!(
                "Failed to {operation} for run {run_id}, control plane responded with status {status}: {body}"
            );
        }
        ControlPlaneError::Transport(e) => {
            log::error!("Failed to {operation} for run {run_id} (network error): {e}");
        }
        ControlPlaneError::Encode(e) => {
            log::error!("Failed to {operation} for run {run_id} (unexpected error): {e}");
        }
    }
}
