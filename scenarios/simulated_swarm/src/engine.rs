use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use harness_bridge_core::prelude::{
    CounterValue, EngineError, LoadEngine, RequestCounters, StopHandle, StopListener,
    AGGREGATED_ENTRY_NAME,
};
use parking_lot::Mutex;

/// Requests completed within this window count towards the current requests per second.
const RPS_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct EntryStats {
    num_requests: u64,
    num_failures: u64,
    total_response_ms: u64,
    min_response_ms: Option<u64>,
    max_response_ms: u64,
    response_times: Vec<u64>,
    recent: VecDeque<Instant>,
}

impl EntryStats {
    fn record(&mut self, response_ms: u64, failed: bool, now: Instant) {
        self.num_requests += 1;
        if failed {
            self.num_failures += 1;
        }
        self.total_response_ms += response_ms;
        self.min_response_ms = Some(self.min_response_ms.map_or(response_ms, |m| m.min(response_ms)));
        self.max_response_ms = self.max_response_ms.max(response_ms);
        self.response_times.push(response_ms);

        self.recent.push_back(now);
        while self
            .recent
            .front()
            .is_some_and(|t| now.duration_since(*t) > RPS_WINDOW)
        {
            self.recent.pop_front();
        }
    }

    fn current_rps(&self, now: Instant) -> f64 {
        let in_window = self
            .recent
            .iter()
            .filter(|t| now.duration_since(**t) <= RPS_WINDOW)
            .count();
        in_window as f64 / RPS_WINDOW.as_secs_f64()
    }

    fn counters(&self, method: &str, name: &str, now: Instant) -> RequestCounters {
        let mut counters = RequestCounters {
            num_requests: Some(CounterValue::from(self.num_requests)),
            num_failures: Some(CounterValue::from(self.num_failures)),
            current_rps: Some(CounterValue::Float(self.current_rps(now))),
            ..RequestCounters::new(method, name)
        };

        // Timings only exist once a request has completed.
        if self.num_requests > 0 {
            counters.avg_response_time = Some(CounterValue::Float(
                self.total_response_ms as f64 / self.num_requests as f64,
            ));
            counters.min_response_time = self.min_response_ms.map(CounterValue::from);
            counters.max_response_time = Some(CounterValue::from(self.max_response_ms));
            counters.median_response_time = percentile(&self.response_times, 0.5).map(CounterValue::from);
        }

        counters
    }
}

/// Nearest-rank percentile of a set of response times.
fn percentile(response_times: &[u64], quantile: f64) -> Option<u64> {
    if response_times.is_empty() {
        return None;
    }

    let mut sorted = response_times.to_vec();
    sorted.sort_unstable();
    let rank = (quantile * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

/// An in-process load engine that records simulated requests.
#[derive(Debug, Default)]
pub struct SimulatedEngine {
    entries: Mutex<BTreeMap<(String, String), EntryStats>>,
    users: AtomicUsize,
    stop_handle: StopHandle,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, method: &str, name: &str, response_ms: u64, failed: bool) {
        self.entries
            .lock()
            .entry((method.to_string(), name.to_string()))
            .or_default()
            .record(response_ms, failed, Instant::now());
    }

    pub fn user_started(&self) {
        self.users.fetch_add(1, Ordering::SeqCst);
    }

    pub fn user_stopped(&self) {
        self.users.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn stop_listener(&self) -> StopListener {
        self.stop_handle.new_listener()
    }
}

impl LoadEngine for SimulatedEngine {
    fn aggregate_counters(&self) -> Option<RequestCounters> {
        let entries = self.entries.lock();
        let mut total = EntryStats::default();
        for stats in entries.values() {
            total.num_requests += stats.num_requests;
            total.num_failures += stats.num_failures;
            total.total_response_ms += stats.total_response_ms;
            total.min_response_ms = match (total.min_response_ms, stats.min_response_ms) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            total.max_response_ms = total.max_response_ms.max(stats.max_response_ms);
            total.response_times.extend_from_slice(&stats.response_times);
            total.recent.extend(stats.recent.iter().copied());
        }

        Some(total.counters("", AGGREGATED_ENTRY_NAME, Instant::now()))
    }

    fn endpoint_counters(&self) -> Vec<RequestCounters> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .map(|((method, name), stats)| stats.counters(method, name, now))
            .collect()
    }

    fn response_time_percentile(&self, quantile: f64) -> Result<Option<CounterValue>, EngineError> {
        if !(quantile > 0.0 && quantile <= 1.0) {
            return Err(EngineError::InvalidPercentile(quantile));
        }

        let entries = self.entries.lock();
        let all: Vec<u64> = entries
            .values()
            .flat_map(|s| s.response_times.iter().copied())
            .collect();

        Ok(percentile(&all, quantile).map(CounterValue::from))
    }

    fn current_user_count(&self) -> Option<CounterValue> {
        Some(CounterValue::from(self.users.load(Ordering::SeqCst) as u64))
    }

    fn stop_run(&self) {
        if self.stop_handle.stop() {
            log::info!("Stop requested, simulated users will finish their current request");
        }
    }
}
