//! # MSP v1 Checksum
//!
//! XOR of every byte from the length byte through the last payload byte.

/// Calculate the MSP v1 checksum
///
/// # Arguments
///
/// * `data` - Byte slice to checksum (Length + Code + Payload)
///
/// # Examples
///
/// ```
/// use msp_client::msp::checksum::xor_checksum;
///
/// // Empty ATTITUDE request: length 0, code 108
/// assert_eq!(xor_checksum(&[0x00, 108]), 108);
/// ```
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc ^ byte)
}

/// Checksum of a frame body given its parts, without concatenating them
pub fn frame_checksum(length: u8, code: u8, payload: &[u8]) -> u8 {
    xor_checksum(payload) ^ length ^ code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(xor_checksum(&[]), 0x00);
    }

    #[test]
    fn test_checksum_known_request() {
        // $M< 0x00 0x64 0x64 is the canonical empty IDENT request
        assert_eq!(xor_checksum(&[0x00, 0x64]), 0x64);
    }

    #[test]
    fn test_checksum_self_cancels() {
        assert_eq!(xor_checksum(&[0xAB, 0xAB]), 0x00);
        assert_eq!(xor_checksum(&[0x12, 0x34, 0x12]), 0x34);
    }

    #[test]
    fn test_frame_checksum_matches_flat() {
        let payload = [0xDC, 0x05, 0xDC, 0x05];
        let mut flat = vec![4u8, 200];
        flat.extend_from_slice(&payload);

        assert_eq!(frame_checksum(4, 200, &payload), xor_checksum(&flat));
    }

    #[test]
    fn test_checksum_changes_with_data() {
        let crc1 = xor_checksum(&[0x06, 0x6C, 0x00, 0x04]);
        let crc2 = xor_checksum(&[0x06, 0x6C, 0x00, 0x05]);
        assert_ne!(crc1, crc2, "Checksum should change when data changes");
    }
}
