use chrono::{DateTime, SecondsFormat, Utc};
use harness_bridge_core::prelude::{CounterValue, LoadEngine, RequestCounters};
use harness_bridge_model::{EndpointStat, MetricsSnapshot};

/// Builds [MetricsSnapshot]s from the live counters of a [LoadEngine].
///
/// Building never fails. Counters the engine has not populated yet are reported as zero, and a
/// percentile lookup that errors only zeroes that percentile.
pub struct MetricsSnapshotBuilder<'a> {
    engine: &'a dyn LoadEngine,
}

impl<'a> MetricsSnapshotBuilder<'a> {
    pub fn new(engine: &'a dyn LoadEngine) -> Self {
        Self { engine }
    }

    /// Take a snapshot of the engine's counters, stamped with the current time.
    pub fn build(&self) -> MetricsSnapshot {
        self.build_at(Utc::now())
    }

    pub fn build_at(&self, now: DateTime<Utc>) -> MetricsSnapshot {
        let entries = self.engine.endpoint_counters();

        // Prefer the engine's own totals, falling back to the aggregate row of the entry list.
        let aggregate = self
            .engine
            .aggregate_counters()
            .or_else(|| entries.iter().find(|e| e.is_aggregate()).cloned())
            .unwrap_or_default();

        let total_requests = count(&aggregate.num_requests);
        let total_failures = count(&aggregate.num_failures);

        let error_rate_percent = if total_requests > 0 {
            total_failures as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        let (p50, p95, p99) = if total_requests > 0 {
            (
                self.percentile(0.50),
                self.percentile(0.95),
                self.percentile(0.99),
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let per_endpoint = entries
            .iter()
            .filter(|e| !e.is_aggregate())
            .map(|e| (EndpointStat::key(&e.method, &e.name), endpoint_stat(e)))
            .collect();

        MetricsSnapshot {
            timestamp: format_timestamp(now),
            total_rps: float(&aggregate.current_rps),
            total_requests,
            total_failures,
            error_rate_percent,
            avg_response_ms: float(&aggregate.avg_response_time),
            p50_response_ms: p50,
            p95_response_ms: p95,
            p99_response_ms: p99,
            current_users: count(&self.engine.current_user_count()),
            per_endpoint,
        }
    }

    fn percentile(&self, quantile: f64) -> f64 {
        match self.engine.response_time_percentile(quantile) {
            Ok(value) => float(&value),
            Err(e) => {
                log::warn!("Failed to get response time percentile {quantile}: {e}");
                0.0
            }
        }
    }
}

/// Format a timestamp the way the control plane expects, e.g. `2024-05-01T10:00:00.000Z`.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn endpoint_stat(counters: &RequestCounters) -> EndpointStat {
    EndpointStat {
        method: counters.method.clone(),
        name: counters.name.clone(),
        num_requests: count(&counters.num_requests),
        num_failures: count(&counters.num_failures),
        avg_response_time: float(&counters.avg_response_time),
        min_response_time: float(&counters.min_response_time),
        max_response_time: float(&counters.max_response_time),
        median_response_time: float(&counters.median_response_time),
        requests_per_second: float(&counters.current_rps),
    }
}

fn count(value: &Option<CounterValue>) -> u64 {
    value.as_ref().map(CounterValue::as_count).unwrap_or(0)
}

fn float(value: &Option<CounterValue>) -> f64 {
    value.as_ref().map(CounterValue::as_f64).unwrap_or(0.0)
}
