//! # MSP Client
//!
//! Polls telemetry from a MultiWii Serial Protocol flight controller.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load configuration (first argument, defaults when omitted)
//!    - Open the serial link and wait for the board to boot
//!
//! 2. **Main Loop**
//!    - Query each configured telemetry code once per poll interval
//!    - Log each sample, and append it to the telemetry log when one is configured
//!    - Skip failed queries; the next tick retries
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C stops polling and logs the totals
//!
//! # Examples
//!
//! ```bash
//! RUST_LOG=debug cargo run --release -- config/default.toml
//! ```

use anyhow::{Context, Result};
use tokio::time::interval;
use tracing::{debug, info, warn};

use msp_client::config::Config;
use msp_client::serial;
use msp_client::session::MspSession;
use msp_client::telemetry::log::TelemetryLog;

/// Number of polling rounds between status log messages
const LOG_INTERVAL_ROUNDS: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("MSP client v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => {
            info!("No configuration file given, using defaults");
            let config = Config::default();
            config.validate()?;
            config
        }
    };

    let commands = config.telemetry.resolve_commands()?;

    let mut telemetry_log = match &config.telemetry.log_dir {
        Some(dir) => {
            info!("Writing telemetry to {}", dir);
            Some(TelemetryLog::new(dir)?)
        }
        None => None,
    };

    let port = serial::open(&config.serial).await?;
    let mut session = MspSession::new(port, &config.session);

    let mut poll_interval = interval(config.telemetry.poll_interval());

    info!(
        "Polling {:?} every {:?}",
        commands,
        config.telemetry.poll_interval()
    );
    info!("Press Ctrl+C to exit");

    let mut rounds: u64 = 0;
    let mut failures: u64 = 0;

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                for &command in &commands {
                    match session.poll(command).await {
                        Ok(sample) => {
                            debug!("{:?}", sample);
                            if let Some(log) = telemetry_log.as_mut() {
                                if let Err(e) = log.write(&sample) {
                                    warn!("Failed to write telemetry log: {}", e);
                                }
                            }
                        }
                        Err(e) => {
                            failures += 1;
                            warn!("Telemetry query failed: {}", e);
                        }
                    }
                }

                rounds += 1;
                if rounds % LOG_INTERVAL_ROUNDS == 0 {
                    let attitude = &session.telemetry().attitude().record;
                    info!(
                        "{} polling rounds, {} failed queries; attitude {:.1}/{:.1}/{:.0}",
                        rounds, failures, attitude.angle_x, attitude.angle_y, attitude.heading
                    );
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total polling rounds: {}, failed queries: {}", rounds, failures);
                break;
            }
        }
    }

    if let Some(log) = telemetry_log.as_mut() {
        log.flush()?;
        info!("Wrote {} telemetry records", log.records());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_interval_constant() {
        // At the default 100 ms poll interval, 100 rounds = 10 seconds
        let seconds = LOG_INTERVAL_ROUNDS as f64 * 0.1;
        assert_eq!(seconds, 10.0);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
