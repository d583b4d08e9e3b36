//! # MSP Protocol Constants and Types
//!
//! Core protocol definitions for MSP v1 (MultiWii Serial Protocol).
//!
//! ```text
//! byte0-2: '$' 'M' '<'   request ('>' response, '!' error)
//! byte3:   payload length (0-255)
//! byte4:   message code (0-255)
//! byte5..: payload
//! last:    checksum = XOR of length, code and payload
//! ```

use crate::error::{MspError, Result};

/// First header byte (`$`)
pub const MSP_PREAMBLE: u8 = b'$';

/// Second header byte (`M`, protocol v1)
pub const MSP_VERSION_V1: u8 = b'M';

/// Header length: preamble + version + direction
pub const MSP_HEADER_SIZE: usize = 3;

/// Bytes framing a payload: header(3) + length(1) + code(1) + checksum(1)
pub const MSP_FRAME_OVERHEAD: usize = MSP_HEADER_SIZE + 3;

/// Maximum payload size (single length byte)
pub const MSP_MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Default baud rate used by MultiWii/Cleanflight firmware
pub const MSP_BAUD_RATE: u32 = 115_200;

/// Frame direction, carried in the third header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Sent by the host, processed by the flight controller
    Request = b'<',
    /// Sent by the flight controller in answer to a request
    Response = b'>',
    /// Sent by the flight controller when a request could not be processed
    Error = b'!',
}

impl Direction {
    /// Parses a direction byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'<' => Some(Direction::Request),
            b'>' => Some(Direction::Response),
            b'!' => Some(Direction::Error),
            _ => None,
        }
    }

    /// Full three byte header for this direction.
    pub fn header(self) -> [u8; MSP_HEADER_SIZE] {
        [MSP_PREAMBLE, MSP_VERSION_V1, self as u8]
    }
}

/// MSP message codes.
///
/// Values are fixed by the firmware and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MspCommand {
    Reboot = 68,
    VtxConfig = 88,
    VtxSetConfig = 89,

    Ident = 100,
    Status = 101,
    RawImu = 102,
    Servo = 103,
    Motor = 104,
    Rc = 105,
    RawGps = 106,
    CompGps = 107,
    Attitude = 108,
    Altitude = 109,
    Analog = 110,
    RcTuning = 111,
    Pid = 112,
    Box = 113,
    Misc = 114,
    MotorPins = 115,
    BoxNames = 116,
    PidNames = 117,
    Wp = 118,
    BoxIds = 119,
    RcRawImu = 121,

    SetRawRc = 200,
    SetRawGps = 201,
    SetPid = 202,
    SetBox = 203,
    SetRcTuning = 204,
    AccCalibration = 205,
    MagCalibration = 206,
    SetMisc = 207,
    ResetConf = 208,
    SetWp = 209,
    SwitchRcSerial = 210,
    IsSerial = 211,
    SetMotor = 214,

    EepromWrite = 250,
    Debug = 254,
}

impl MspCommand {
    /// Every command the catalog knows about, in code order.
    pub const ALL: [MspCommand; 39] = [
        MspCommand::Reboot,
        MspCommand::VtxConfig,
        MspCommand::VtxSetConfig,
        MspCommand::Ident,
        MspCommand::Status,
        MspCommand::RawImu,
        MspCommand::Servo,
        MspCommand::Motor,
        MspCommand::Rc,
        MspCommand::RawGps,
        MspCommand::CompGps,
        MspCommand::Attitude,
        MspCommand::Altitude,
        MspCommand::Analog,
        MspCommand::RcTuning,
        MspCommand::Pid,
        MspCommand::Box,
        MspCommand::Misc,
        MspCommand::MotorPins,
        MspCommand::BoxNames,
        MspCommand::PidNames,
        MspCommand::Wp,
        MspCommand::BoxIds,
        MspCommand::RcRawImu,
        MspCommand::SetRawRc,
        MspCommand::SetRawGps,
        MspCommand::SetPid,
        MspCommand::SetBox,
        MspCommand::SetRcTuning,
        MspCommand::AccCalibration,
        MspCommand::MagCalibration,
        MspCommand::SetMisc,
        MspCommand::ResetConf,
        MspCommand::SetWp,
        MspCommand::SwitchRcSerial,
        MspCommand::IsSerial,
        MspCommand::SetMotor,
        MspCommand::EepromWrite,
        MspCommand::Debug,
    ];

    /// Wire value of this command.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<MspCommand> for u8 {
    fn from(command: MspCommand) -> Self {
        command as u8
    }
}

impl TryFrom<u8> for MspCommand {
    type Error = MspError;

    fn try_from(code: u8) -> Result<Self> {
        MspCommand::ALL
            .iter()
            .copied()
            .find(|command| command.code() == code)
            .ok_or(MspError::UnknownCode(code))
    }
}

/// MSP frame structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspFrame {
    /// Request, response or error
    pub direction: Direction,

    /// Message code
    pub code: u8,

    /// Payload data
    pub payload: Vec<u8>,
}

impl MspFrame {
    /// Create a new MSP frame
    ///
    /// # Errors
    ///
    /// Returns error if payload exceeds MSP_MAX_PAYLOAD_SIZE (255 bytes)
    pub fn new(direction: Direction, code: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MSP_MAX_PAYLOAD_SIZE {
            return Err(MspError::Encode(format!(
                "payload size {} exceeds maximum {}",
                payload.len(),
                MSP_MAX_PAYLOAD_SIZE
            )));
        }

        Ok(Self {
            direction,
            code,
            payload,
        })
    }

    /// Payload length as carried in the length byte
    ///
    /// Cannot overflow since payload is validated to be ≤ 255 bytes
    pub fn length(&self) -> u8 {
        self.payload.len() as u8
    }

    /// Payload grouped into integer fields per the message catalog
    pub fn fields(&self) -> Vec<i64> {
        super::catalog::decode_fields(self.code, &self.payload)
    }

    /// Known command for this frame's code, if any
    pub fn command(&self) -> Option<MspCommand> {
        MspCommand::try_from(self.code).ok()
    }
}
