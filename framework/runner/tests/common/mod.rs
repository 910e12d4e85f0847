#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use control_plane_client::prelude::{PostRequest, Transport, TransportError, TransportResponse};
use harness_bridge_core::prelude::{
    CounterValue, EngineError, LoadEngine, RequestCounters, StopHandle, StopListener,
    AGGREGATED_ENTRY_NAME,
};
use parking_lot::Mutex;

/// A load engine with fixed endpoints and a request counter the test drives.
#[derive(Default)]
pub struct FakeEngine {
    requests: AtomicU64,
    stop_calls: AtomicUsize,
    stop_handle: StopHandle,
}

impl FakeEngine {
    pub fn record_requests(&self, count: u64) {
        self.requests.fetch_add(count, Ordering::SeqCst);
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn stop_listener(&self) -> StopListener {
        self.stop_handle.new_listener()
    }
}

impl LoadEngine for FakeEngine {
    fn aggregate_counters(&self) -> Option<RequestCounters> {
        Some(RequestCounters {
            num_requests: Some(CounterValue::from(self.requests.load(Ordering::SeqCst))),
            num_failures: Some(CounterValue::Int(0)),
            avg_response_time: Some(CounterValue::Float(12.0)),
            current_rps: Some(CounterValue::Float(4.0)),
            ..RequestCounters::new("", AGGREGATED_ENTRY_NAME)
        })
    }

    fn endpoint_counters(&self) -> Vec<RequestCounters> {
        vec![RequestCounters {
            num_requests: Some(CounterValue::from(self.requests.load(Ordering::SeqCst))),
            ..RequestCounters::new("GET", "/items")
        }]
    }

    fn response_time_percentile(&self, _quantile: f64) -> Result<Option<CounterValue>, EngineError> {
        Ok(Some(CounterValue::Int(10)))
    }

    fn current_user_count(&self) -> Option<CounterValue> {
        Some(CounterValue::Int(5))
    }

    fn stop_run(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stop_handle.stop();
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Status(u16),
    Timeout,
}

/// Records every request and answers 200, unless told to fail or to be slow.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<PostRequest>>,
    completed: AtomicUsize,
    delay: Mutex<Duration>,
    failure: Mutex<Option<Failure>>,
}

impl RecordingTransport {
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn fail_with(&self, failure: Option<Failure>) {
        *self.failure.lock() = failure;
    }

    pub fn requests(&self) -> Vec<PostRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose URL ends with the given path, in the order they were sent.
    pub fn requests_to(&self, path: &str) -> Vec<PostRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .cloned()
            .collect()
    }

    /// The last path segment of every request, in the order they were sent.
    pub fn calls(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.url.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn run_ids(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.body["runId"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn started_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(&self, request: PostRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        self.requests.lock().push(request);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.failure.lock();
        let result = match failure {
            None => Ok(TransportResponse {
                status: 200,
                body: String::new(),
            }),
            Some(Failure::Status(status)) => Ok(TransportResponse {
                status,
                body: "internal error".to_string(),
            }),
            Some(Failure::Timeout) => {
                tokio::time::sleep(timeout).await;
                Err(TransportError::Timeout(timeout))
            }
        };

        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}
