//! # Telemetry Module
//!
//! Turns decoded field lists into typed telemetry records.
//!
//! This module handles:
//! - Field-to-record mapping and unit conversion per telemetry code
//! - Stamping each record with exchange latency and capture time
//! - The per-session [`Telemetry`] store of last known values
//! - Writing samples as JSON lines ([`log`])
//!
//! ## Units
//!
//! | Record | Conversion |
//! |--------|------------|
//! | Attitude | angles ÷ 10 (tenths of a degree to degrees), heading in degrees |
//! | Raw IMU | none |
//! | Raw GPS | lat/lon ÷ 10^7 (degrees), course ÷ 10 (degrees) |
//! | Altitude | none (cm, cm/s) |
//! | PID | P ÷ 10, I ÷ 1000, D unscaled |

pub mod log;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::{MspError, Result};
use crate::msp::protocol::MspCommand;

/// Telemetry queries and the names used for them in configuration and logs
pub const TELEMETRY_COMMANDS: &[(MspCommand, &str)] = &[
    (MspCommand::RawImu, "raw_imu"),
    (MspCommand::Motor, "motor"),
    (MspCommand::Rc, "rc"),
    (MspCommand::RawGps, "raw_gps"),
    (MspCommand::Attitude, "attitude"),
    (MspCommand::Altitude, "altitude"),
    (MspCommand::Pid, "pid"),
];

/// Most motor outputs a record keeps
pub const MAX_MOTORS: usize = 8;

/// Latency and capture time of the exchange that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Stamp {
    /// Round-trip duration in seconds, rounded to the millisecond
    pub elapsed: f64,
    pub timestamp: DateTime<Utc>,
}

impl Stamp {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            elapsed: (elapsed.as_secs_f64() * 1000.0).round() / 1000.0,
            timestamp: Utc::now(),
        }
    }
}

/// A record together with its [`Stamp`]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Stamped<T> {
    #[serde(flatten)]
    pub record: T,
    #[serde(flatten)]
    pub stamp: Stamp,
}

/// A typed record decoded from one telemetry query
pub trait TelemetryRecord: Sized + Clone {
    /// Query that produces this record
    const COMMAND: MspCommand;

    /// Build the record from catalog-decoded fields
    ///
    /// # Errors
    ///
    /// Returns `MalformedSequence` if fewer fields than the record needs are present.
    fn from_fields(fields: &[i64]) -> Result<Self>;

    /// Wrap a stamped record as a [`TelemetrySample`]
    fn into_sample(stamped: Stamped<Self>) -> TelemetrySample;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Attitude {
    /// Roll angle in degrees
    pub angle_x: f64,
    /// Pitch angle in degrees
    pub angle_y: f64,
    /// Heading in degrees
    pub heading: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RawImu {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
    pub mag: [i16; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RawGps {
    pub fix: bool,
    pub satellites: u8,
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
    /// Meters
    pub altitude: u16,
    /// cm/s
    pub speed: u16,
    /// Degrees; `None` when the firmware did not send a course field
    pub course: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Altitude {
    /// Estimated altitude in cm
    pub estimated: i32,
    /// Vertical speed in cm/s
    pub vario: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Motor {
    pub outputs: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RcChannels {
    pub roll: u16,
    pub pitch: u16,
    pub yaw: u16,
    pub throttle: u16,
    pub aux: Vec<u16>,
}

/// One axis of PID coefficients, already rescaled
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PidTerm {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PidCoefficients {
    pub roll: PidTerm,
    pub pitch: PidTerm,
    pub yaw: PidTerm,
}

fn require(command: MspCommand, fields: &[i64], needed: usize) -> Result<()> {
    if fields.len() < needed {
        return Err(MspError::MalformedSequence(format!(
            "{:?} needs {} fields, got {}",
            command,
            needed,
            fields.len()
        )));
    }
    Ok(())
}

fn axis(fields: &[i64]) -> [i16; 3] {
    [fields[0] as i16, fields[1] as i16, fields[2] as i16]
}

impl TelemetryRecord for Attitude {
    const COMMAND: MspCommand = MspCommand::Attitude;

    fn from_fields(fields: &[i64]) -> Result<Self> {
        require(Self::COMMAND, fields, 3)?;
        Ok(Self {
            angle_x: fields[0] as f64 / 10.0,
            angle_y: fields[1] as f64 / 10.0,
            heading: fields[2] as f64,
        })
    }

    fn into_sample(stamped: Stamped<Self>) -> TelemetrySample {
        TelemetrySample::Attitude(stamped)
    }
}

impl TelemetryRecord for RawImu {
    const COMMAND: MspCommand = MspCommand::RawImu;

    fn from_fields(fields: &[i64]) -> Result<Self> {
        require(Self::COMMAND, fields, 9)?;
        Ok(Self {
            accel: axis(&fields[0..3]),
            gyro: axis(&fields[3..6]),
            mag: axis(&fields[6..9]),
        })
    }

    fn into_sample(stamped: Stamped<Self>) -> TelemetrySample {
        TelemetrySample::RawImu(stamped)
    }
}

impl TelemetryRecord for RawGps {
    const COMMAND: MspCommand = MspCommand::RawGps;

    fn from_fields(fields: &[i64]) -> Result<Self> {
        require(Self::COMMAND, fields, 6)?;

        let course = fields.get(6).map(|&c| c as f64 / 10.0);
        if course.is_none() {
            warn!("RAW_GPS response has no ground course field, course left unset");
        }

        Ok(Self {
            fix: fields[0] != 0,
            satellites: fields[1] as u8,
            latitude: fields[2] as f64 / 1e7,
            longitude: fields[3] as f64 / 1e7,
            altitude: fields[4] as u16,
            speed: fields[5] as u16,
            course,
        })
    }

    fn into_sample(stamped: Stamped<Self>) -> TelemetrySample {
        TelemetrySample::RawGps(stamped)
    }
}

impl TelemetryRecord for Altitude {
    const COMMAND: MspCommand = MspCommand::Altitude;

    fn from_fields(fields: &[i64]) -> Result<Self> {
        require(Self::COMMAND, fields, 2)?;
        Ok(Self {
            estimated: fields[0] as i32,
            vario: fields[1] as i16,
        })
    }

    fn into_sample(stamped: Stamped<Self>) -> TelemetrySample {
        TelemetrySample::Altitude(stamped)
    }
}

impl TelemetryRecord for Motor {
    const COMMAND: MspCommand = MspCommand::Motor;

    fn from_fields(fields: &[i64]) -> Result<Self> {
        require(Self::COMMAND, fields, 1)?;
        Ok(Self {
            outputs: fields.iter().take(MAX_MOTORS).map(|&v| v as u16).collect(),
        })
    }

    fn into_sample(stamped: Stamped<Self>) -> TelemetrySample {
        TelemetrySample::Motor(stamped)
    }
}

impl TelemetryRecord for RcChannels {
    const COMMAND: MspCommand = MspCommand::Rc;

    fn from_fields(fields: &[i64]) -> Result<Self> {
        require(Self::COMMAND, fields, 4)?;
        Ok(Self {
            roll: fields[0] as u16,
            pitch: fields[1] as u16,
            yaw: fields[2] as u16,
            throttle: fields[3] as u16,
            aux: fields[4..].iter().map(|&v| v as u16).collect(),
        })
    }

    fn into_sample(stamped: Stamped<Self>) -> TelemetrySample {
        TelemetrySample::Rc(stamped)
    }
}

impl TelemetryRecord for PidCoefficients {
    const COMMAND: MspCommand = MspCommand::Pid;

    fn from_fields(fields: &[i64]) -> Result<Self> {
        require(Self::COMMAND, fields, 9)?;

        let term = |offset: usize| PidTerm {
            p: fields[offset] as f64 / 10.0,
            i: fields[offset + 1] as f64 / 1000.0,
            d: fields[offset + 2] as f64,
        };

        Ok(Self {
            roll: term(0),
            pitch: term(3),
            yaw: term(6),
        })
    }

    fn into_sample(stamped: Stamped<Self>) -> TelemetrySample {
        TelemetrySample::Pid(stamped)
    }
}

/// A decoded telemetry record of any kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetrySample {
    Attitude(Stamped<Attitude>),
    RawImu(Stamped<RawImu>),
    RawGps(Stamped<RawGps>),
    Altitude(Stamped<Altitude>),
    Motor(Stamped<Motor>),
    Rc(Stamped<RcChannels>),
    Pid(Stamped<PidCoefficients>),
}

/// Decode `fields` as a `T` and stamp it
pub fn stamped<T: TelemetryRecord>(fields: &[i64], stamp: Stamp) -> Result<Stamped<T>> {
    Ok(Stamped {
        record: T::from_fields(fields)?,
        stamp,
    })
}

fn sampled<T: TelemetryRecord>(fields: &[i64], stamp: Stamp) -> Result<TelemetrySample> {
    stamped::<T>(fields, stamp).map(T::into_sample)
}

impl TelemetrySample {
    /// Decode the fields of a response to `code`
    ///
    /// # Errors
    ///
    /// - `UnknownCode` if `code` is not in the catalog
    /// - `NotTelemetry` if `code` is known but is not a telemetry query
    /// - `MalformedSequence` if too few fields are present
    ///
    /// # Examples
    ///
    /// ```
    /// use msp_client::telemetry::{Stamp, TelemetrySample};
    /// use std::time::Duration;
    ///
    /// let sample = TelemetrySample::decode(108, &[100, -50, 270], Stamp::new(Duration::ZERO)).unwrap();
    /// match sample {
    ///     TelemetrySample::Attitude(a) => assert_eq!(a.record.angle_x, 10.0),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// ```
    pub fn decode(code: u8, fields: &[i64], stamp: Stamp) -> Result<Self> {
        let command = MspCommand::try_from(code)?;

        match command {
            MspCommand::Attitude => sampled::<Attitude>(fields, stamp),
            MspCommand::RawImu => sampled::<RawImu>(fields, stamp),
            MspCommand::RawGps => sampled::<RawGps>(fields, stamp),
            MspCommand::Altitude => sampled::<Altitude>(fields, stamp),
            MspCommand::Motor => sampled::<Motor>(fields, stamp),
            MspCommand::Rc => sampled::<RcChannels>(fields, stamp),
            MspCommand::Pid => sampled::<PidCoefficients>(fields, stamp),
            _ => Err(MspError::NotTelemetry(code)),
        }
    }

    /// Query that produced this sample
    pub fn command(&self) -> MspCommand {
        match self {
            Self::Attitude(_) => Attitude::COMMAND,
            Self::RawImu(_) => RawImu::COMMAND,
            Self::RawGps(_) => RawGps::COMMAND,
            Self::Altitude(_) => Altitude::COMMAND,
            Self::Motor(_) => Motor::COMMAND,
            Self::Rc(_) => RcChannels::COMMAND,
            Self::Pid(_) => PidCoefficients::COMMAND,
        }
    }

    pub fn stamp(&self) -> Stamp {
        match self {
            Self::Attitude(s) => s.stamp,
            Self::RawImu(s) => s.stamp,
            Self::RawGps(s) => s.stamp,
            Self::Altitude(s) => s.stamp,
            Self::Motor(s) => s.stamp,
            Self::Rc(s) => s.stamp,
            Self::Pid(s) => s.stamp,
        }
    }
}

/// Returns true when `command` produces a [`TelemetrySample`]
pub fn is_telemetry(command: MspCommand) -> bool {
    TELEMETRY_COMMANDS.iter().any(|(c, _)| *c == command)
}

/// Last known telemetry of one session
///
/// Every record starts zeroed and is replaced whole by each successful
/// query; a failed query leaves it as it was.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Telemetry {
    attitude: Stamped<Attitude>,
    raw_imu: Stamped<RawImu>,
    raw_gps: Stamped<RawGps>,
    altitude: Stamped<Altitude>,
    motor: Stamped<Motor>,
    rc: Stamped<RcChannels>,
    pid: Stamped<PidCoefficients>,
}

impl Telemetry {
    pub fn attitude(&self) -> &Stamped<Attitude> {
        &self.attitude
    }

    pub fn raw_imu(&self) -> &Stamped<RawImu> {
        &self.raw_imu
    }

    pub fn raw_gps(&self) -> &Stamped<RawGps> {
        &self.raw_gps
    }

    pub fn altitude(&self) -> &Stamped<Altitude> {
        &self.altitude
    }

    pub fn motor(&self) -> &Stamped<Motor> {
        &self.motor
    }

    pub fn rc(&self) -> &Stamped<RcChannels> {
        &self.rc
    }

    pub fn pid(&self) -> &Stamped<PidCoefficients> {
        &self.pid
    }

    pub(crate) fn apply(&mut self, sample: &TelemetrySample) {
        match sample {
            TelemetrySample::Attitude(s) => self.attitude = s.clone(),
            TelemetrySample::RawImu(s) => self.raw_imu = s.clone(),
            TelemetrySample::RawGps(s) => self.raw_gps = s.clone(),
            TelemetrySample::Altitude(s) => self.altitude = s.clone(),
            TelemetrySample::Motor(s) => self.motor = s.clone(),
            TelemetrySample::Rc(s) => self.rc = s.clone(),
            TelemetrySample::Pid(s) => self.pid = s.clone(),
        }
    }
}
