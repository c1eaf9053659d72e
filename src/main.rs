use std::sync::Arc;
use std::time::Duration;

use cire::capture::dispatcher::CaptureDispatcher;
use cire::capture::observer::RateCounter;
use cire::configuration::config::Config;
use cire::proxy;
use cire::shutdown::ShutdownCoordinator;
use cire::warc::rotator::WarcRotator;
use log::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "archiving to {} ({:?}, rotate at {} bytes)",
        config.rotator.output_directory.display(),
        config.rotator.compression,
        config.rotator.size_threshold_bytes
    );

    let (tx, done) = match WarcRotator::open(config.rotator.clone()) {
        Ok(endpoints) => endpoints,
        Err(e) => {
            error!("Unable to open the archive writer: {}", e);
            std::process::exit(1);
        }
    };
    let dispatcher = CaptureDispatcher::new(tx.clone(), Some(Arc::new(RateCounter::new())));
    let coordinator = ShutdownCoordinator::new(tx, done, SHUTDOWN_GRACE);

    let mut server = tokio::spawn(proxy::run(config.listen_address, dispatcher));
    info!("Server started");

    let mut failed = false;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Signal received, stopping");
            // Dropping the accept loop tears down connection tasks with it,
            // releasing their queue senders so the writer can drain.
            server.abort();
        }
        result = &mut server => {
            match result {
                Ok(Err(e)) => error!("Proxy terminated: {}", e),
                Ok(Ok(())) => {}
                Err(e) => error!("Proxy task failed: {}", e),
            }
            failed = true;
        }
    }

    match coordinator.shutdown().await {
        Ok(summary) => info!(
            "Archive complete: {} file(s), {} record(s), {} bytes",
            summary.files, summary.records, summary.bytes
        ),
        Err(e) => {
            error!("Archive writer failed: {}", e);
            failed = true;
        }
    }
    if failed {
        std::process::exit(1);
    }
    info!("Server exited properly");
}
