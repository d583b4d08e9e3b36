//! # MSP Message Catalog
//!
//! Static table mapping every known message code to its class and payload
//! layout. It is the only place that knows how a payload splits into fields;
//! both the encoder and the decoder consult it.
//!
//! Codes missing from the table are not an error: their payloads are treated
//! as a plain sequence of signed little-endian half-words.

use bytes::{Buf, BufMut, BytesMut};
use tracing::debug;

use super::protocol::{MspCommand, MSP_MAX_PAYLOAD_SIZE};
use crate::error::{MspError, Result};

/// Whether a code asks the flight controller for data or tells it to do something
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Empty request, data-carrying response
    Query,
    /// Data-carrying request, empty acknowledgement
    Command,
}

/// Wire type of a single payload field (all little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    I16,
    U16,
    I32,
    U32,
}

impl FieldType {
    /// Size of the field on the wire, in bytes
    pub const fn width(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::I16 | FieldType::U16 => 2,
            FieldType::I32 | FieldType::U32 => 4,
        }
    }

    /// Inclusive range of values this field can carry
    pub const fn range(self) -> (i64, i64) {
        match self {
            FieldType::U8 => (0, u8::MAX as i64),
            FieldType::I16 => (i16::MIN as i64, i16::MAX as i64),
            FieldType::U16 => (0, u16::MAX as i64),
            FieldType::I32 => (i32::MIN as i64, i32::MAX as i64),
            FieldType::U32 => (0, u32::MAX as i64),
        }
    }

    fn get(self, buf: &mut &[u8]) -> i64 {
        match self {
            FieldType::U8 => buf.get_u8() as i64,
            FieldType::I16 => buf.get_i16_le() as i64,
            FieldType::U16 => buf.get_u16_le() as i64,
            FieldType::I32 => buf.get_i32_le() as i64,
            FieldType::U32 => buf.get_u32_le() as i64,
        }
    }

    fn put(self, value: i64, out: &mut BytesMut) -> Result<()> {
        let (min, max) = self.range();
        if value < min || value > max {
            return Err(MspError::Encode(format!(
                "value {} does not fit field type {:?} ({}..={})",
                value, self, min, max
            )));
        }

        match self {
            FieldType::U8 => out.put_u8(value as u8),
            FieldType::I16 => out.put_i16_le(value as i16),
            FieldType::U16 => out.put_u16_le(value as u16),
            FieldType::I32 => out.put_i32_le(value as i32),
            FieldType::U32 => out.put_u32_le(value as u32),
        }
        Ok(())
    }
}

/// One named payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    /// Unit or scale, for documentation only
    pub unit: &'static str,
}

impl Field {
    pub const fn new(name: &'static str, ty: FieldType, unit: &'static str) -> Self {
        Self { name, ty, unit }
    }
}

/// Shape of a message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// No payload
    Empty,
    /// Fixed ordered list of fields; newer firmware may append more
    Fixed(&'static [Field]),
    /// Any number of fields of one type
    Repeated(Field),
}

impl Layout {
    /// Minimum payload size for a complete decode
    pub fn size(&self) -> usize {
        match self {
            Layout::Empty | Layout::Repeated(_) => 0,
            Layout::Fixed(fields) => fields.iter().map(|f| f.ty.width()).sum(),
        }
    }
}

/// Catalog entry for one message code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpec {
    pub command: MspCommand,
    pub name: &'static str,
    pub class: MessageClass,
    pub layout: Layout,
}

use FieldType::{I16, I32, U16, U32, U8};

const RAW_HALF_WORD: Field = Field::new("raw", I16, "");

const IDENT: &[Field] = &[
    Field::new("version", U8, ""),
    Field::new("multitype", U8, ""),
    Field::new("msp_version", U8, ""),
    Field::new("capability", U32, "bitmask"),
];

const STATUS: &[Field] = &[
    Field::new("cycle_time", U16, "us"),
    Field::new("i2c_errors", U16, "count"),
    Field::new("sensors", U16, "bitmask"),
    Field::new("flags", U32, "bitmask"),
    Field::new("current_set", U8, ""),
];

const RAW_IMU: &[Field] = &[
    Field::new("acc_x", I16, "raw"),
    Field::new("acc_y", I16, "raw"),
    Field::new("acc_z", I16, "raw"),
    Field::new("gyro_x", I16, "raw"),
    Field::new("gyro_y", I16, "raw"),
    Field::new("gyro_z", I16, "raw"),
    Field::new("mag_x", I16, "raw"),
    Field::new("mag_y", I16, "raw"),
    Field::new("mag_z", I16, "raw"),
];

const RAW_GPS: &[Field] = &[
    Field::new("fix", U8, "bool"),
    Field::new("num_sat", U8, "count"),
    Field::new("lat", I32, "1e-7 deg"),
    Field::new("lon", I32, "1e-7 deg"),
    Field::new("altitude", U16, "m"),
    Field::new("speed", U16, "cm/s"),
    Field::new("ground_course", U16, "0.1 deg"),
];

const SET_RAW_GPS: &[Field] = &[
    Field::new("fix", U8, "bool"),
    Field::new("num_sat", U8, "count"),
    Field::new("lat", I32, "1e-7 deg"),
    Field::new("lon", I32, "1e-7 deg"),
    Field::new("altitude", U16, "m"),
    Field::new("speed", U16, "cm/s"),
];

const COMP_GPS: &[Field] = &[
    Field::new("distance_to_home", U16, "m"),
    Field::new("direction_to_home", I16, "deg"),
    Field::new("update", U8, "toggle"),
];

const ATTITUDE: &[Field] = &[
    Field::new("angle_x", I16, "0.1 deg"),
    Field::new("angle_y", I16, "0.1 deg"),
    Field::new("heading", I16, "deg"),
];

const ALTITUDE: &[Field] = &[
    Field::new("est_alt", I32, "cm"),
    Field::new("vario", I16, "cm/s"),
];

const ANALOG: &[Field] = &[
    Field::new("vbat", U8, "0.1 V"),
    Field::new("power_meter_sum", U16, "mAh"),
    Field::new("rssi", U16, "0-1023"),
    Field::new("amperage", U16, "0.01 A"),
];

const RC_TUNING: &[Field] = &[
    Field::new("rc_rate", U8, "0.01"),
    Field::new("rc_expo", U8, "0.01"),
    Field::new("roll_pitch_rate", U8, "0.01"),
    Field::new("yaw_rate", U8, "0.01"),
    Field::new("dyn_thr_pid", U8, "0.01"),
    Field::new("throttle_mid", U8, "0.01"),
    Field::new("throttle_expo", U8, "0.01"),
];

const PID: &[Field] = &[
    Field::new("roll_p", U16, "0.1"),
    Field::new("roll_i", U16, "0.001"),
    Field::new("roll_d", U16, "1"),
    Field::new("pitch_p", U16, "0.1"),
    Field::new("pitch_i", U16, "0.001"),
    Field::new("pitch_d", U16, "1"),
    Field::new("yaw_p", U16, "0.1"),
    Field::new("yaw_i", U16, "0.001"),
    Field::new("yaw_d", U16, "1"),
];

const MISC: &[Field] = &[
    Field::new("power_trigger", U16, ""),
    Field::new("min_throttle", U16, "us"),
    Field::new("max_throttle", U16, "us"),
    Field::new("min_command", U16, "us"),
    Field::new("failsafe_throttle", U16, "us"),
    Field::new("arm_count", U16, "count"),
    Field::new("lifetime", U32, "s"),
    Field::new("mag_declination", U16, "0.1 deg"),
    Field::new("vbat_scale", U8, ""),
    Field::new("vbat_warn1", U8, "0.1 V"),
    Field::new("vbat_warn2", U8, "0.1 V"),
    Field::new("vbat_crit", U8, "0.1 V"),
];

const WAYPOINT: &[Field] = &[
    Field::new("wp_no", U8, ""),
    Field::new("lat", I32, "1e-7 deg"),
    Field::new("lon", I32, "1e-7 deg"),
    Field::new("alt_hold", U32, "cm"),
    Field::new("heading", U16, "deg"),
    Field::new("time_to_stay", U16, "ms"),
    Field::new("nav_flag", U8, ""),
];

const DEBUG: &[Field] = &[
    Field::new("debug1", I16, ""),
    Field::new("debug2", I16, ""),
    Field::new("debug3", I16, ""),
    Field::new("debug4", I16, ""),
];

const fn entry(
    command: MspCommand,
    name: &'static str,
    class: MessageClass,
    layout: Layout,
) -> MessageSpec {
    MessageSpec {
        command,
        name,
        class,
        layout,
    }
}

use MessageClass::{Command, Query};

/// The message catalog, in code order
pub static CATALOG: &[MessageSpec] = &[
    entry(MspCommand::Reboot, "REBOOT", Command, Layout::Empty),
    entry(MspCommand::VtxConfig, "VTX_CONFIG", Query, Layout::Repeated(Field::new("config", U8, ""))),
    entry(MspCommand::VtxSetConfig, "VTX_SET_CONFIG", Command, Layout::Repeated(Field::new("config", U8, ""))),
    entry(MspCommand::Ident, "IDENT", Query, Layout::Fixed(IDENT)),
    entry(MspCommand::Status, "STATUS", Query, Layout::Fixed(STATUS)),
    entry(MspCommand::RawImu, "RAW_IMU", Query, Layout::Fixed(RAW_IMU)),
    entry(MspCommand::Servo, "SERVO", Query, Layout::Repeated(Field::new("servo", U16, "us"))),
    entry(MspCommand::Motor, "MOTOR", Query, Layout::Repeated(Field::new("motor", U16, "us"))),
    entry(MspCommand::Rc, "RC", Query, Layout::Repeated(Field::new("channel", U16, "us"))),
    entry(MspCommand::RawGps, "RAW_GPS", Query, Layout::Fixed(RAW_GPS)),
    entry(MspCommand::CompGps, "COMP_GPS", Query, Layout::Fixed(COMP_GPS)),
    entry(MspCommand::Attitude, "ATTITUDE", Query, Layout::Fixed(ATTITUDE)),
    entry(MspCommand::Altitude, "ALTITUDE", Query, Layout::Fixed(ALTITUDE)),
    entry(MspCommand::Analog, "ANALOG", Query, Layout::Fixed(ANALOG)),
    entry(MspCommand::RcTuning, "RC_TUNING", Query, Layout::Fixed(RC_TUNING)),
    entry(MspCommand::Pid, "PID", Query, Layout::Fixed(PID)),
    entry(MspCommand::Box, "BOX", Query, Layout::Repeated(Field::new("box", U16, "bitmask"))),
    entry(MspCommand::Misc, "MISC", Query, Layout::Fixed(MISC)),
    entry(MspCommand::MotorPins, "MOTOR_PINS", Query, Layout::Repeated(Field::new("pin", U8, ""))),
    entry(MspCommand::BoxNames, "BOXNAMES", Query, Layout::Repeated(Field::new("char", U8, "ascii"))),
    entry(MspCommand::PidNames, "PIDNAMES", Query, Layout::Repeated(Field::new("char", U8, "ascii"))),
    entry(MspCommand::Wp, "WP", Query, Layout::Fixed(WAYPOINT)),
    entry(MspCommand::BoxIds, "BOXIDS", Query, Layout::Repeated(Field::new("id", U8, ""))),
    entry(MspCommand::RcRawImu, "RC_RAW_IMU", Query, Layout::Repeated(RAW_HALF_WORD)),
    entry(MspCommand::SetRawRc, "SET_RAW_RC", Command, Layout::Repeated(Field::new("channel", U16, "us"))),
    entry(MspCommand::SetRawGps, "SET_RAW_GPS", Command, Layout::Fixed(SET_RAW_GPS)),
    entry(MspCommand::SetPid, "SET_PID", Command, Layout::Repeated(Field::new("pid", U16, "opaque"))),
    entry(MspCommand::SetBox, "SET_BOX", Command, Layout::Repeated(Field::new("box", U16, "bitmask"))),
    entry(MspCommand::SetRcTuning, "SET_RC_TUNING", Command, Layout::Fixed(RC_TUNING)),
    entry(MspCommand::AccCalibration, "ACC_CALIBRATION", Command, Layout::Empty),
    entry(MspCommand::MagCalibration, "MAG_CALIBRATION", Command, Layout::Empty),
    entry(MspCommand::SetMisc, "SET_MISC", Command, Layout::Repeated(Field::new("misc", U16, "opaque"))),
    entry(MspCommand::ResetConf, "RESET_CONF", Command, Layout::Empty),
    entry(MspCommand::SetWp, "SET_WP", Command, Layout::Fixed(WAYPOINT)),
    entry(MspCommand::SwitchRcSerial, "SWITCH_RC_SERIAL", Command, Layout::Empty),
    entry(MspCommand::IsSerial, "IS_SERIAL", Command, Layout::Empty),
    entry(MspCommand::SetMotor, "SET_MOTOR", Command, Layout::Repeated(Field::new("motor", U16, "us"))),
    entry(MspCommand::EepromWrite, "EEPROM_WRITE", Command, Layout::Empty),
    entry(MspCommand::Debug, "DEBUG", Query, Layout::Fixed(DEBUG)),
];

/// Look up the catalog entry for a code
pub fn lookup(code: u8) -> Option<&'static MessageSpec> {
    CATALOG.iter().find(|spec| spec.command.code() == code)
}

/// Human-readable name for a code, `"UNKNOWN"` when not in the catalog
pub fn name_of(code: u8) -> &'static str {
    lookup(code).map_or("UNKNOWN", |spec| spec.name)
}

/// Split a payload into integer fields
///
/// Known fixed layouts are decoded in order while each field fits. A short
/// payload stops at the first field that does not fit, so callers can detect
/// it by counting fields. Bytes past a complete fixed layout, and whole
/// payloads of unknown codes, come back as signed half-words.
///
/// # Examples
///
/// ```
/// use msp_client::msp::catalog::decode_fields;
///
/// // ATTITUDE: 10.0°, -5.0°, 270°
/// let payload = [0x64, 0x00, 0xCE, 0xFF, 0x0E, 0x01];
/// assert_eq!(decode_fields(108, &payload), vec![100, -50, 270]);
/// ```
pub fn decode_fields(code: u8, payload: &[u8]) -> Vec<i64> {
    let mut buf = payload;

    match lookup(code).map(|spec| spec.layout) {
        Some(Layout::Fixed(fields)) => {
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                if buf.remaining() < field.ty.width() {
                    debug!(
                        "{} payload short at field '{}': {} of {} bytes",
                        name_of(code),
                        field.name,
                        payload.len(),
                        Layout::Fixed(fields).size()
                    );
                    return values;
                }
                values.push(field.ty.get(&mut buf));
            }
            values.extend(raw_half_words(buf));
            values
        }
        Some(Layout::Repeated(field)) => {
            let width = field.ty.width();
            let mut values = Vec::with_capacity(buf.len() / width);
            while buf.remaining() >= width {
                values.push(field.ty.get(&mut buf));
            }
            values
        }
        Some(Layout::Empty) | None => raw_half_words(buf),
    }
}

/// Serialize integer fields into a payload for `code`
///
/// Fields take the types of the code's catalog layout. A fixed layout given
/// fewer fields encodes just that prefix; fields past its end, and every
/// field of a code without a layout, are signed 16-bit half-words, matching
/// how [`decode_fields`] reads them back.
///
/// # Errors
///
/// Returns an error if a value does not fit its field type or the payload
/// would exceed 255 bytes.
pub fn encode_fields(code: u8, fields: &[i64]) -> Result<Vec<u8>> {
    let mut out = BytesMut::with_capacity(fields.len() * 2);

    match lookup(code).map(|spec| spec.layout) {
        Some(Layout::Fixed(layout)) => {
            for (field, &value) in layout.iter().zip(fields) {
                field.ty.put(value, &mut out)?;
            }
            for &value in fields.iter().skip(layout.len()) {
                put_half_word(value, &mut out)?;
            }
        }
        Some(Layout::Repeated(field)) => {
            for &value in fields {
                field.ty.put(value, &mut out)?;
            }
        }
        _ => {
            for &value in fields {
                put_half_word(value, &mut out)?;
            }
        }
    }

    if out.len() > MSP_MAX_PAYLOAD_SIZE {
        return Err(MspError::Encode(format!(
            "payload size {} exceeds maximum {}",
            out.len(),
            MSP_MAX_PAYLOAD_SIZE
        )));
    }

    Ok(out.to_vec())
}

fn raw_half_words(mut buf: &[u8]) -> Vec<i64> {
    let mut values = Vec::with_capacity(buf.len() / 2);
    while buf.remaining() >= 2 {
        values.push(buf.get_i16_le() as i64);
    }
    if buf.has_remaining() {
        debug!("ignoring trailing odd payload byte 0x{:02X}", buf[0]);
    }
    values
}

fn put_half_word(value: i64, out: &mut BytesMut) -> Result<()> {
    RAW_HALF_WORD.ty.put(value, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_command() {
        for command in MspCommand::ALL {
            let spec = lookup(command.code()).expect("command missing from catalog");
            assert_eq!(spec.command, command);
        }
        assert_eq!(CATALOG.len(), MspCommand::ALL.len());
    }

    #[test]
    fn test_catalog_classes() {
        assert_eq!(lookup(108).unwrap().class, MessageClass::Query);
        assert_eq!(lookup(200).unwrap().class, MessageClass::Command);
        assert_eq!(lookup(250).unwrap().class, MessageClass::Command);
    }

    #[test]
    fn test_unknown_code_lookup() {
        assert!(lookup(150).is_none());
        assert_eq!(name_of(150), "UNKNOWN");
        assert_eq!(name_of(106), "RAW_GPS");
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(lookup(108).unwrap().layout.size(), 6);
        assert_eq!(lookup(102).unwrap().layout.size(), 18);
        assert_eq!(lookup(106).unwrap().layout.size(), 16);
        assert_eq!(lookup(109).unwrap().layout.size(), 6);
        assert_eq!(lookup(112).unwrap().layout.size(), 18);
    }

    #[test]
    fn test_decode_unknown_code_as_half_words() {
        let payload = [0x01, 0x00, 0xFF, 0xFF, 0x10];
        assert_eq!(decode_fields(150, &payload), vec![1, -1]);
    }

    #[test]
    fn test_decode_mixed_width_layout() {
        // RAW_GPS: fix, 9 sats, lat 37.7749, lon -122.4194, 52 m, 310 cm/s, 180.5°
        let mut payload = vec![1u8, 9];
        payload.extend_from_slice(&377_749_000i32.to_le_bytes());
        payload.extend_from_slice(&(-1_224_194_000i32).to_le_bytes());
        payload.extend_from_slice(&52u16.to_le_bytes());
        payload.extend_from_slice(&310u16.to_le_bytes());
        payload.extend_from_slice(&1805u16.to_le_bytes());

        assert_eq!(
            decode_fields(106, &payload),
            vec![1, 9, 377_749_000, -1_224_194_000, 52, 310, 1805]
        );
    }

    #[test]
    fn test_decode_short_fixed_payload_stops_early() {
        // ATTITUDE with the heading missing
        let payload = [0x64, 0x00, 0xCE, 0xFF, 0x0E];
        assert_eq!(decode_fields(108, &payload), vec![100, -50]);
    }

    #[test]
    fn test_decode_extended_fixed_payload_keeps_tail() {
        let payload = [0x64, 0x00, 0xCE, 0xFF, 0x0E, 0x01, 0x07, 0x00];
        assert_eq!(decode_fields(108, &payload), vec![100, -50, 270, 7]);
    }

    #[test]
    fn test_decode_repeated_unsigned() {
        let payload = [0xDC, 0x05, 0xD0, 0x07];
        assert_eq!(decode_fields(105, &payload), vec![1500, 2000]);
    }

    #[test]
    fn test_encode_repeated_layout() {
        let payload = encode_fields(200, &[1500, 2000]).unwrap();
        assert_eq!(payload, vec![0xDC, 0x05, 0xD0, 0x07]);
    }

    #[test]
    fn test_encode_fixed_layout() {
        let payload = encode_fields(108, &[100, -50, 270]).unwrap();
        assert_eq!(payload, vec![0x64, 0x00, 0xCE, 0xFF, 0x0E, 0x01]);
    }

    #[test]
    fn test_encode_empty_query() {
        assert!(encode_fields(108, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_encode_out_of_range() {
        assert!(encode_fields(200, &[-1]).is_err());
        assert!(encode_fields(150, &[70_000]).is_err());
        assert!(encode_fields(108, &[40_000, 0, 0]).is_err());
    }

    #[test]
    fn test_prefix_of_fixed_layout_round_trips() {
        let cases: [(u8, Vec<i64>); 4] = [
            (106, vec![1, 2, 3]),
            (106, vec![1, 9, -1_224_194_000]),
            (109, vec![5]),
            (109, vec![-70_000]),
        ];

        for (code, fields) in cases {
            let payload = encode_fields(code, &fields).unwrap();
            assert_eq!(decode_fields(code, &payload), fields, "code {}", code);
        }

        // RAW_GPS prefix keeps the layout widths: u8, u8, i32
        assert_eq!(encode_fields(106, &[1, 2, 3]).unwrap().len(), 6);
    }

    #[test]
    fn test_raw_half_words_are_signed_both_ways() {
        let fields = [i16::MIN as i64, -1, 0, i16::MAX as i64];
        let payload = encode_fields(150, &fields).unwrap();
        assert_eq!(decode_fields(150, &payload), fields);

        // Values only an unsigned half-word could carry would not read back
        assert!(matches!(
            encode_fields(150, &[40_000]),
            Err(MspError::Encode(_))
        ));
        assert!(matches!(
            encode_fields(108, &[100, -50, 270, 40_000]),
            Err(MspError::Encode(_))
        ));
    }

    #[test]
    fn test_encode_payload_too_large() {
        let fields = vec![0i64; 128];
        assert!(encode_fields(150, &fields).is_err());
        assert_eq!(encode_fields(150, &fields[..127]).unwrap().len(), 254);
    }
}
