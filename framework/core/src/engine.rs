use serde::{Deserialize, Serialize};

/// Name of the synthetic entry that load engines use for their totals row.
///
/// Engines that report their totals inside the per-endpoint list use this name for it. The entry
/// feeds the aggregate fields of a snapshot and never appears as an endpoint.
pub const AGGREGATED_ENTRY_NAME: &str = "Aggregated";

/// A raw counter value as reported by a load engine.
///
/// Engines are not consistent about reporting counts as integers and timings as floats, so both
/// shapes are accepted everywhere and coerced at the point of use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CounterValue {
    Int(i64),
    Float(f64),
}

impl CounterValue {
    /// The value as a float. Non-finite values are reported as `0.0`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            CounterValue::Int(v) => v as f64,
            CounterValue::Float(v) if v.is_finite() => v,
            CounterValue::Float(_) => 0.0,
        }
    }

    /// The value as a count. Fractions are truncated, negative and non-finite values are `0`.
    pub fn as_count(&self) -> u64 {
        match *self {
            CounterValue::Int(v) => u64::try_from(v).unwrap_or(0),
            CounterValue::Float(v) if v.is_finite() && v > 0.0 => v.trunc() as u64,
            CounterValue::Float(_) => 0,
        }
    }
}

impl From<i64> for CounterValue {
    fn from(value: i64) -> Self {
        CounterValue::Int(value)
    }
}

impl From<u64> for CounterValue {
    fn from(value: u64) -> Self {
        CounterValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for CounterValue {
    fn from(value: f64) -> Self {
        CounterValue::Float(value)
    }
}

/// Live counters for one request entry, either a single endpoint or the aggregate.
///
/// Every counter is optional because engines only populate most of them once the first request
/// for the entry has completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCounters {
    pub method: String,
    pub name: String,
    pub num_requests: Option<CounterValue>,
    pub num_failures: Option<CounterValue>,
    pub avg_response_time: Option<CounterValue>,
    pub min_response_time: Option<CounterValue>,
    pub max_response_time: Option<CounterValue>,
    pub median_response_time: Option<CounterValue>,
    pub current_rps: Option<CounterValue>,
}

impl RequestCounters {
    pub fn new(method: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.name == AGGREGATED_ENTRY_NAME
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Statistic is not available yet: {0}")]
    Unavailable(String),
    #[error("Invalid percentile requested: {0}")]
    InvalidPercentile(f64),
    #[error("Engine error: {0}")]
    Other(String),
}

/// The load engine that the bridge is embedded in.
///
/// The bridge only reads counters from the engine and asks it to stop. It never schedules load
/// itself.
pub trait LoadEngine: Send + Sync + 'static {
    /// Totals across all endpoints. `None` before the engine has any statistics.
    fn aggregate_counters(&self) -> Option<RequestCounters>;

    /// Counters for each endpoint the engine has seen. May include the aggregate entry, see
    /// [AGGREGATED_ENTRY_NAME].
    fn endpoint_counters(&self) -> Vec<RequestCounters>;

    /// The aggregate response time at the given quantile, in milliseconds.
    ///
    /// `quantile` is in the range `0.0..=1.0`. Engines that cannot answer yet return `Ok(None)`.
    fn response_time_percentile(&self, quantile: f64) -> Result<Option<CounterValue>, EngineError>;

    /// The number of simulated users that are currently running. `None` if there is no runner.
    fn current_user_count(&self) -> Option<CounterValue>;

    /// Request that the engine stops the current run.
    ///
    /// This must not wait for the test-stop event to be delivered, it is called from background
    /// work that the stop path joins. Repeated requests must be harmless.
    fn stop_run(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_value_coercion() {
        assert_eq!(12.0, CounterValue::Int(12).as_f64());
        assert_eq!(12, CounterValue::Float(12.9).as_count());
        assert_eq!(0, CounterValue::Int(-3).as_count());
        assert_eq!(0, CounterValue::Float(f64::NAN).as_count());
        assert_eq!(0.0, CounterValue::Float(f64::INFINITY).as_f64());
    }

    #[test]
    fn deserialize_mixed_counters() {
        let counters: RequestCounters = serde_json::from_str(
            r#"{"method":"GET","name":"/items","numRequests":10.0,"numFailures":2,"avgResponseTime":null}"#,
        )
        .unwrap();

        assert_eq!(Some(CounterValue::Float(10.0)), counters.num_requests);
        assert_eq!(Some(CounterValue::Int(2)), counters.num_failures);
        assert_eq!(None, counters.avg_response_time);
        assert_eq!(None, counters.current_rps);
    }

    #[test]
    fn aggregate_entry_is_matched_by_name() {
        assert!(RequestCounters::new("", AGGREGATED_ENTRY_NAME).is_aggregate());
        assert!(!RequestCounters::new("GET", "aggregated").is_aggregate());
    }
}
