mod cli;
mod engine;
mod users;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use harness_bridge_core::prelude::LoadEngine;
use harness_bridge_runner::prelude::{BridgeConfig, HarnessBridge, LifecycleEvents};

use crate::cli::SimulatedSwarmCli;
use crate::engine::SimulatedEngine;

fn main() -> anyhow::Result<()> {
    harness_bridge_runner::init_logging();
    let cli = SimulatedSwarmCli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create the Tokio runtime")?;

    runtime.block_on(run(cli))
}

async fn run(cli: SimulatedSwarmCli) -> anyhow::Result<()> {
    let engine = Arc::new(SimulatedEngine::new());
    let events = LifecycleEvents::new();
    let bridge = HarnessBridge::install(BridgeConfig::from_env(), engine.clone(), &events)?;

    let listener = tokio::net::TcpListener::bind(cli.admin_listen)
        .await
        .with_context(|| format!("Failed to bind admin endpoint to {}", cli.admin_listen))?;
    let router = bridge.endpoint().clone().router();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            log::error!("Admin endpoint failed: {e}");
        }
    });
    log::info!("Admin endpoint listening on {}", cli.admin_listen);

    {
        let engine = engine.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::info!("Received shutdown signal, shutting down...");
                    engine.stop_run();
                }
                Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
            }
        });
    }

    let mut stop_listener = engine.stop_listener();
    log::info!(
        "Waiting {} seconds for the run context before starting",
        cli.start_delay
    );
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(cli.start_delay)) => {}
        _ = stop_listener.wait_for_stop() => {
            log::info!("Stopped before the test started");
            return Ok(());
        }
    }

    events.emit_test_start().await;

    let handles = (0..cli.users)
        .map(|i| {
            tokio::spawn(users::run_user(
                format!("user-{i}"),
                engine.clone(),
                cli.failure_rate,
                engine.stop_listener(),
            ))
        })
        .collect::<Vec<_>>();
    log::info!("Started {} simulated users", cli.users);

    if let Some(stop_after) = cli.stop_after {
        let engine = engine.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(stop_after)).await;
            log::info!("Stopping the test after {stop_after} seconds");
            engine.stop_run();
        });
    }

    stop_listener.wait_for_stop().await;

    for handle in handles {
        handle
            .await
            .context("Error joining task for simulated user")?;
    }

    events.emit_test_stop().await;

    if let Some(aggregate) = engine.aggregate_counters() {
        log::info!(
            "Test finished: {} requests, {} failures",
            aggregate.num_requests.map(|v| v.as_count()).unwrap_or_default(),
            aggregate.num_failures.map(|v| v.as_count()).unwrap_or_default()
        );
    }

    Ok(())
}
