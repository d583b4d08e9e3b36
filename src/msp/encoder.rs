//! # MSP Frame Encoder
//!
//! Builds complete MSP v1 frames from a message code and its fields.

use bytes::{BufMut, BytesMut};

use super::catalog::encode_fields;
use super::checksum::frame_checksum;
use super::protocol::*;
use crate::error::Result;

/// Encode a request frame for `code` carrying `fields`
///
/// Fields are serialized as described by the message catalog (16-bit
/// little-endian half-words for codes it does not know).
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Complete frame: `$M<` + length + code + payload + checksum
///
/// # Errors
///
/// Returns error if a field does not fit its wire type or the payload
/// exceeds 255 bytes.
///
/// # Examples
///
/// ```
/// use msp_client::msp::encoder::encode_request;
/// use msp_client::msp::protocol::MspCommand;
///
/// let frame = encode_request(MspCommand::Attitude.code(), &[]).unwrap();
/// assert_eq!(frame, vec![b'$', b'M', b'<', 0, 108, 108]);
/// ```
pub fn encode_request(code: u8, fields: &[i64]) -> Result<Vec<u8>> {
    let payload = encode_fields(code, fields)?;
    let frame = MspFrame::new(Direction::Request, code, payload)?;
    Ok(encode_frame(&frame))
}

/// Serialize an already-built frame
///
/// # Examples
///
/// ```
/// use msp_client::msp::encoder::encode_frame;
/// use msp_client::msp::protocol::{Direction, MspFrame};
///
/// let frame = MspFrame::new(Direction::Response, 200, vec![]).unwrap();
/// assert_eq!(encode_frame(&frame), vec![b'$', b'M', b'>', 0, 200, 200]);
/// ```
pub fn encode_frame(frame: &MspFrame) -> Vec<u8> {
    let length = frame.length();
    let mut out = BytesMut::with_capacity(MSP_FRAME_OVERHEAD + frame.payload.len());

    out.put_slice(&frame.direction.header());
    out.put_u8(length);
    out.put_u8(frame.code);
    out.put_slice(&frame.payload);
    out.put_u8(frame_checksum(length, frame.code, &frame.payload));

    out.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msp::checksum::xor_checksum;

    #[test]
    fn test_encode_empty_request_length() {
        let frame = encode_request(MspCommand::Ident.code(), &[]).unwrap();

        // header(3) + length(1) + code(1) + checksum(1)
        assert_eq!(frame.len(), MSP_FRAME_OVERHEAD);
        assert_eq!(frame, vec![0x24, 0x4D, 0x3C, 0x00, 0x64, 0x64]);
    }

    #[test]
    fn test_encode_set_raw_rc_structure() {
        let channels = [1500, 1500, 1000, 2000, 1000, 1000, 1000, 1000];
        let frame = encode_request(MspCommand::SetRawRc.code(), &channels).unwrap();

        assert_eq!(frame.len(), MSP_FRAME_OVERHEAD + 16);
        assert_eq!(&frame[0..3], b"$M<");
        assert_eq!(frame[3], 16); // Length
        assert_eq!(frame[4], 200); // Code
        assert_eq!(&frame[5..7], &1500u16.to_le_bytes());
        assert_eq!(&frame[11..13], &2000u16.to_le_bytes());

        // Checksum covers length through last payload byte
        let last = frame.len() - 1;
        assert_eq!(frame[last], xor_checksum(&frame[3..last]));
    }

    #[test]
    fn test_encode_negative_field_twos_complement() {
        let frame = encode_request(150, &[-50]).unwrap();
        assert_eq!(&frame[5..7], &[0xCE, 0xFF]);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let fields = vec![1i64; 200];
        assert!(encode_request(150, &fields).is_err());
    }

    #[test]
    fn test_encode_frame_different_data_different_checksum() {
        let frame1 = encode_request(200, &[1000; 8]).unwrap();
        let frame2 = encode_request(200, &[1500, 1000, 1000, 1000, 1000, 1000, 1000, 1000]).unwrap();

        assert_ne!(frame1[21], frame2[21]);
    }
}
