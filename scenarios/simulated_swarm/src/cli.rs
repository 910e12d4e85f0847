use std::net::SocketAddr;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(about, long_about = None)]
pub struct SimulatedSwarmCli {
    /// The address to serve the run context admin endpoints on
    #[clap(long, env = "ADMIN_LISTEN_ADDR", default_value = "127.0.0.1:8089")]
    pub admin_listen: SocketAddr,

    /// The number of simulated users to run
    #[clap(long, short, default_value_t = 10)]
    pub users: usize,

    /// Seconds to wait before starting the test, giving the orchestrator time to set the run context
    #[clap(long, default_value_t = 5)]
    pub start_delay: u64,

    /// Stop the test after this many seconds, as an operator would.
    ///
    /// This is independent of the run context's duration limit. Without it the test runs until the
    /// duration limit is reached or Ctrl-C is pressed.
    #[clap(long)]
    pub stop_after: Option<u64>,

    /// The percentage of requests that fail
    #[clap(long, default_value_t = 2.0, value_parser = parse_percentage)]
    pub failure_rate: f64,
}

fn parse_percentage(s: &str) -> anyhow::Result<f64> {
    let value = s.parse::<f64>()?;
    if !(0.0..=100.0).contains(&value) {
        anyhow::bail!("Expected a percentage between 0 and 100, got {value}");
    }

    Ok(value)
}
