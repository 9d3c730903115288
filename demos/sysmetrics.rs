use std::time::Duration;

use fedlog::env::env_or;
use fedlog::{SysmetricLogger, TrackTarget};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = env_or("FEDLOG_SERVER", "127.0.0.1");
    let seconds: u64 = env_or("FEDLOG_DEMO_SECONDS", "5").parse()?;

    let mut sysmetrics = SysmetricLogger::new(server, "demo").handle_signals(true);
    sysmetrics.track(
        TrackTarget::new(file!(), "demo", "main"),
        Duration::from_millis(500),
        &[],
    )?;

    tokio::time::sleep(Duration::from_secs(seconds)).await;
    let status = sysmetrics.terminate().await?;
    println!("sampler exited with status {status}");
    Ok(())
}
