use std::sync::Arc;
use std::time::{Duration, Instant};

use harness_bridge_core::prelude::{StopListener, StopSignalError};
use rand::Rng;

use crate::engine::SimulatedEngine;

/// One synthetic endpoint and the latency profile of its responses.
#[derive(Debug, Clone, Copy)]
pub struct EndpointProfile {
    pub method: &'static str,
    pub name: &'static str,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
}

pub const ENDPOINTS: [EndpointProfile; 4] = [
    EndpointProfile {
        method: "GET",
        name: "/api/items",
        min_latency_ms: 5,
        max_latency_ms: 60,
    },
    EndpointProfile {
        method: "GET",
        name: "/api/items/{id}",
        min_latency_ms: 2,
        max_latency_ms: 30,
    },
    EndpointProfile {
        method: "POST",
        name: "/api/items",
        min_latency_ms: 20,
        max_latency_ms: 150,
    },
    EndpointProfile {
        method: "GET",
        name: "/health",
        min_latency_ms: 1,
        max_latency_ms: 5,
    },
];

const THINK_TIME_MS: std::ops::RangeInclusive<u64> = 100..=500;

/// Run one simulated user until the engine is stopped.
pub async fn run_user(
    user_id: String,
    engine: Arc<SimulatedEngine>,
    failure_rate_percent: f64,
    mut stop_listener: StopListener,
) {
    engine.user_started();
    log::debug!("Starting {user_id}");

    loop {
        if stop_listener.should_stop() {
            log::debug!("Stopping {user_id}");
            break;
        }

        match request(&engine, failure_rate_percent, &mut stop_listener).await {
            Ok(()) => {}
            Err(e) if e.is::<StopSignalError>() => {
                // Expected when stopping, the check at the top of the loop breaks out.
            }
            Err(e) => log::error!("Simulated request failed for {user_id}: {e:?}"),
        }
    }

    engine.user_stopped();
}

async fn request(
    engine: &SimulatedEngine,
    failure_rate_percent: f64,
    stop_listener: &mut StopListener,
) -> anyhow::Result<()> {
    let (endpoint, latency, failed, think_time) = {
        let mut rng = rand::thread_rng();
        let endpoint = ENDPOINTS[rng.gen_range(0..ENDPOINTS.len())];
        let latency = rng.gen_range(endpoint.min_latency_ms..=endpoint.max_latency_ms);
        let failed = rng.gen_bool(failure_rate_percent / 100.0);
        let think_time = rng.gen_range(THINK_TIME_MS);
        (endpoint, latency, failed, think_time)
    };

    let started = Instant::now();
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(latency)) => {}
        _ = stop_listener.wait_for_stop() => return Err(StopSignalError::default().into()),
    }
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    engine.record(endpoint.method, endpoint.name, elapsed_ms, failed);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(think_time)) => {}
        _ = stop_listener.wait_for_stop() => return Err(StopSignalError::default().into()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_bridge_core::prelude::LoadEngine;

    #[tokio::test(start_paused = true)]
    async fn users_record_requests_until_stopped() {
        let engine = Arc::new(SimulatedEngine::new());
        let user = tokio::spawn(run_user(
            "user-0".to_string(),
            engine.clone(),
            0.0,
            engine.stop_listener(),
        ));

        tokio::time::sleep(Duration::from_secs(5)).await;
        engine.stop_run();
        user.await.unwrap();

        let aggregate = engine.aggregate_counters().unwrap();
        assert!(aggregate.num_requests.unwrap().as_count() > 0);
        assert_eq!(0, aggregate.num_failures.unwrap().as_count());
        assert_eq!(0, engine.current_user_count().unwrap().as_count());
    }
}
