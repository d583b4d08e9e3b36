//! # MSP Client Library
//!
//! Query telemetry from, and send control commands to, a flight controller
//! over the MultiWii Serial Protocol (MSP v1).
//!
//! This library provides the frame codec and message catalog, a transport
//! session performing request / response exchanges over any async byte
//! stream, typed telemetry records, and the timed arm / disarm / auto-level
//! sequences.

pub mod config;
pub mod control;
pub mod error;
pub mod msp;
pub mod serial;
pub mod session;
pub mod telemetry;

pub use error::{MspError, Result};
pub use session::{Exchange, MspSession};
