//! # Serial Communication Module
//!
//! Acquires the serial link to the flight controller and hands it to an
//! [`MspSession`](crate::session::MspSession) as an [`MspPort`].
//!
//! This module handles:
//! - Opening the device at the configured baud rate, 8N1, no flow control
//! - Auto-detecting the device among common paths
//! - Waiting for the board to boot after the port opens

pub mod port;

pub use port::MspPort;

use std::time::Duration;

use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{MspError, Result};

/// Port value that requests auto-detection
pub const AUTO_DETECT: &str = "auto";

/// Device paths tried by auto-detection (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC flight controllers (most common)
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/ttyAMA0", // Raspberry Pi UART
];

/// Open the flight controller link described by `config`
///
/// Waits `wakeup_delay_ms` after opening; many boards reset when the port
/// opens and ignore traffic until they finish booting.
///
/// # Examples
///
/// ```no_run
/// use msp_client::config::SerialConfig;
/// use msp_client::serial;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let port = serial::open(&SerialConfig::default()).await?;
///     Ok(())
/// }
/// ```
pub async fn open(config: &SerialConfig) -> Result<SerialStream> {
    let (port, path) = if config.port == AUTO_DETECT {
        open_with_paths(DEFAULT_DEVICE_PATHS, config.baud_rate)?
    } else {
        (open_port(&config.port, config.baud_rate)?, config.port.clone())
    };

    info!(
        "Opened flight controller at {} ({} baud), waking up board...",
        path, config.baud_rate
    );
    tokio::time::sleep(Duration::from_millis(config.wakeup_delay_ms)).await;

    Ok(port)
}

/// Open the first path in `paths` that succeeds
///
/// # Returns
///
/// * `Result<(SerialStream, String)>` - Opened port and the path it was found at
pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<(SerialStream, String)> {
    for path in paths {
        debug!("Trying to open serial port: {}", path);

        match open_port(path, baud_rate) {
            Ok(port) => return Ok((port, path.to_string())),
            Err(e) => {
                warn!("Failed to open {}: {}", path, e);
                continue;
            }
        }
    }

    Err(MspError::StreamUnavailable(format!(
        "no flight controller found at {}",
        paths.join(", ")
    )))
}

/// Open a specific serial port with MSP settings
fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| MspError::StreamUnavailable(format!("Failed to open {}: {}", path, e)))
}
