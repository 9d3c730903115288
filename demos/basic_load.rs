use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::error;

use fedlog::env::{config_from_env, env_or};
use fedlog::init::{init_tracing_with_config, BridgeConfig};
use fedlog::{LoggerHandle, Severity};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // FEDLOG_VARIANT=graylog FEDLOG_SERVER=... FEDLOG_PORT=... ships to Graylog instead
    let mut handle = LoggerHandle::new(config_from_env()?);
    let logger = handle.initialise()?;

    init_tracing_with_config(
        logger,
        BridgeConfig {
            min_level: Severity::Info,
            enable_stdout: false,
        },
    )?;

    let n: u64 = env_or("FEDLOG_DEMO_EVENTS", "10000").parse()?;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "basic load test error");
    }

    let elapsed = start.elapsed();
    println!("{}: sent {} events in {:?} (~{:.0} ev/s)",
        handle.name(),
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Give the dispatcher a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
    Ok(())
}
