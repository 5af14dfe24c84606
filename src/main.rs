//! SD Logger - Entry Point
//!
//! Mounts the card once at startup and reports its state periodically.

use log::{error, info};
use tokio::time::{MissedTickBehavior, interval};

use sd_logger::utils::logging::setup_logging;
use sd_logger::{LoggerConfig, SdLogger, SdLoggerError};

#[tokio::main]
async fn main() {
    let config = match LoggerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            setup_logging("info");
            error!("{}", SdLoggerError::from(e));
            return;
        }
    };

    setup_logging(&config.logging.level);

    run(config).await;
}

async fn run(config: LoggerConfig) {
    info!("Launching SD logger...");

    let mut logger = SdLogger::from_config(&config);

    // A card that fails to mount is reported, not fatal
    if let Err(e) = logger.mount() {
        error!("Continuing without a card: {}", SdLoggerError::from(e));
    }

    let mut ticker = interval(config.diagnostics.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info!("{}", logger.describe());
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down SD logger");
    logger.unmount();
}
