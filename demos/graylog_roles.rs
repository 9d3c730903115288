use tokio::time::{sleep, Duration};

use fedlog::env::env_or;
use fedlog::stage::FnFilter;
use fedlog::{LogCall, Role, RoleLogger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = env_or("FEDLOG_SERVER", "127.0.0.1");

    let mut director = RoleLogger::director(server.as_str(), "main").build();
    let mut ttp = RoleLogger::coordinator(server.as_str(), "ttp0")
        .censor(["secret"])
        .build();
    let mut worker = RoleLogger::worker(server.as_str(), "w1")
        .debugging_fields(true)
        .filter(FnFilter::shared("tag_round", |_, _, mut record| {
            record.insert("round", 1);
            record
        }))
        .build();

    director.initialise()?;
    ttp.initialise()?;
    worker.initialise()?;

    for role in Role::ALL {
        println!("{:<12} prefix {:<5} port {}", format!("{role:?}"), role.prefix(), role.default_port());
    }

    director.info(LogCall::new("registered {} workers").arg(1))?;
    ttp.info(LogCall::new("keys exchanged").field("secret", "s3cr3t"))?;
    worker.warning(LogCall::new("local loss").field("loss", 0.42))?;

    sleep(Duration::from_secs(1)).await;
    Ok(())
}
