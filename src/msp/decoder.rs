//! # MSP Frame Decoder
//!
//! Decodes MSP v1 frames, either from a complete byte buffer or straight off
//! an async byte stream.
//!
//! Both paths synchronise on the `$M` + direction header, discarding any
//! bytes in front of it, so leftovers from an earlier failed exchange do not
//! poison the next one.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::checksum::frame_checksum;
use super::protocol::*;
use crate::error::{MspError, Result};

/// Decode the first complete frame found in `buf`
///
/// # Returns
///
/// * `Result<(MspFrame, usize)>` - Decoded frame and the number of bytes
///   consumed from `buf` (garbage before the header included)
///
/// # Errors
///
/// Returns error if:
/// - No header is present (`MalformedSequence`)
/// - The buffer ends before the declared length is satisfied (`MalformedSequence`)
/// - The checksum does not match (`ChecksumMismatch`)
///
/// # Examples
///
/// ```
/// use msp_client::msp::decoder::decode_frame;
///
/// let bytes = [0xFF, b'$', b'M', b'>', 0, 108, 108];
/// let (frame, used) = decode_frame(&bytes).unwrap();
/// assert_eq!(frame.code, 108);
/// assert_eq!(used, bytes.len());
/// ```
pub fn decode_frame(buf: &[u8]) -> Result<(MspFrame, usize)> {
    let (start, direction) = find_header(buf).ok_or_else(|| {
        MspError::MalformedSequence(format!("no frame header in {} bytes", buf.len()))
    })?;

    let body = &buf[start + MSP_HEADER_SIZE..];

    // length(1) + code(1) + checksum(1) at minimum
    if body.len() < 3 {
        return Err(MspError::MalformedSequence(format!(
            "frame truncated after header: {} bytes",
            body.len()
        )));
    }

    let length = body[0];
    let code = body[1];
    let needed = 2 + length as usize + 1;
    if body.len() < needed {
        return Err(MspError::MalformedSequence(format!(
            "declared payload of {} bytes, only {} available",
            length,
            body.len().saturating_sub(3)
        )));
    }

    let payload = &body[2..2 + length as usize];
    let received = body[2 + length as usize];
    verify_checksum(length, code, payload, received)?;

    let frame = MspFrame::new(direction, code, payload.to_vec())?;
    Ok((frame, start + MSP_HEADER_SIZE + needed))
}

/// Read one frame from an async byte stream
///
/// Discards bytes until a header is found, then reads exactly the declared
/// payload and checksum. May wait forever on a silent stream; bound it with
/// `tokio::time::timeout`.
///
/// # Errors
///
/// - `StreamUnavailable` if the stream fails or closes before a header
/// - `MalformedSequence` if the stream closes mid-frame
/// - `ChecksumMismatch` if the frame is corrupt
pub async fn read_frame<R>(reader: &mut R) -> Result<MspFrame>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let direction = sync_header(reader).await?;

    let length = reader.read_u8().await.map_err(mid_frame)?;
    let code = reader.read_u8().await.map_err(mid_frame)?;

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload).await.map_err(mid_frame)?;
    let received = reader.read_u8().await.map_err(mid_frame)?;

    verify_checksum(length, code, &payload, received)?;

    debug!(
        "Received MSP frame code {} ({} payload bytes, {:?})",
        code, length, direction
    );
    MspFrame::new(direction, code, payload)
}

/// Scan the stream until `$`, `M` and a valid direction byte arrive in sequence.
async fn sync_header<R>(reader: &mut R) -> Result<Direction>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut skipped = 0usize;
    let mut matched = 0usize;

    loop {
        let byte = reader.read_u8().await.map_err(before_frame)?;

        match (matched, byte) {
            (_, MSP_PREAMBLE) => matched = 1,
            (1, MSP_VERSION_V1) => matched = 2,
            (2, _) => {
                if let Some(direction) = Direction::from_byte(byte) {
                    if skipped > 0 {
                        debug!("Skipped {} bytes before MSP header", skipped);
                    }
                    return Ok(direction);
                }
                skipped += 3;
                matched = 0;
            }
            _ => {
                skipped += matched + 1;
                matched = 0;
            }
        }
    }
}

fn find_header(buf: &[u8]) -> Option<(usize, Direction)> {
    buf.windows(MSP_HEADER_SIZE).enumerate().find_map(|(i, w)| {
        if w[0] == MSP_PREAMBLE && w[1] == MSP_VERSION_V1 {
            Direction::from_byte(w[2]).map(|direction| (i, direction))
        } else {
            None
        }
    })
}

fn verify_checksum(length: u8, code: u8, payload: &[u8], received: u8) -> Result<()> {
    let expected = frame_checksum(length, code, payload);
    if expected != received {
        return Err(MspError::ChecksumMismatch {
            expected,
            actual: received,
        });
    }
    Ok(())
}

fn before_frame(err: io::Error) -> MspError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        MspError::StreamUnavailable("stream closed while waiting for a frame".to_string())
    } else {
        MspError::StreamUnavailable(format!("read failed: {}", err))
    }
}

fn mid_frame(err: io::Error) -> MspError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        MspError::MalformedSequence("stream closed mid-frame".to_string())
    } else {
        MspError::StreamUnavailable(format!("read failed: {}", err))
    }
}
