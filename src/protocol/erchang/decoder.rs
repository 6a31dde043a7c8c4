//! # Erchang Frame Decoder
//!
//! Decodes telemetry frames notified by the sonar device.
//!
//! ## Frame Layout (18 bytes)
//!
//! | Byte | Meaning |
//! |------|---------|
//! | 0-1 | Identifier `S F` |
//! | 2-3 | Unknown, always 0 |
//! | 4 | Flags, bit 3 = dry |
//! | 5 | Unknown, always 9 |
//! | 6-7 | Depth, feet (integer, hundredths) |
//! | 8 | Bottom return strength |
//! | 9-10 | Fish depth, feet (integer, hundredths) |
//! | 11 | Battery (high nibble), fish strength (low nibble) |
//! | 12-13 | Temperature, Fahrenheit (integer, hundredths) |
//! | 14-16 | Unknown, always 0 |
//! | 17 | Sum of bytes 0-16, modulo 256 |
//!
//! Structural problems (length, identifier, checksum) reject the frame. Unexpected
//! values in the unknown bytes are only logged: firmware variants differ there.

use tracing::debug;

use super::checksum::sum8;
use super::constants::*;
use crate::error::{Result, SonarLinkError};
use crate::protocol::SonarReading;
use crate::sample::DRY_SENTINEL;

/// Decode an integer byte plus a hundredths byte
pub fn decode_fixed_point(real: u8, hundredths: u8) -> f32 {
    real as f32 + hundredths as f32 / 100.0
}

/// Validate a telemetry frame without decoding it
///
/// # Errors
///
/// Returns error if:
/// - Frame is not exactly 18 bytes
/// - Identifier bytes are not `S F`
/// - Byte 17 is not the sum of bytes 0-16
pub fn validate_sample_frame(frame: &[u8]) -> Result<()> {
    if frame.len() != SAMPLE_FRAME_SIZE {
        return Err(SonarLinkError::MalformedFrame(format!(
            "expected {} bytes, got {}",
            SAMPLE_FRAME_SIZE,
            frame.len()
        )));
    }

    if frame[0] != ID0 || frame[1] != ID1 {
        return Err(SonarLinkError::MalformedFrame(format!(
            "bad signature 0x{:02X} 0x{:02X}",
            frame[0], frame[1]
        )));
    }

    let expected = sum8(&frame[..SAMPLE_CHECKSUM_INDEX]);
    let actual = frame[SAMPLE_CHECKSUM_INDEX];
    if expected != actual {
        return Err(SonarLinkError::ChecksumMismatch { expected, actual });
    }

    Ok(())
}

/// Decode a telemetry frame
///
/// # Arguments
///
/// * `frame` - Raw notification bytes
/// * `received_at_ms` - Receipt time; the device has no clock
///
/// # Returns
///
/// * `Result<SonarReading>` - Decoded reading, or error if the frame is invalid
///
/// # Examples
///
/// ```
/// use sonar_link::protocol::erchang::decoder::decode_sample_frame;
///
/// let mut frame = [b'S', b'F', 0, 0, 0, 9, 10, 0, 200, 0, 0, 0x40, 68, 0, 0, 0, 0, 0];
/// frame[17] = frame[..17].iter().fold(0u8, |a, &b| a.wrapping_add(b));
///
/// let reading = decode_sample_frame(&frame, 0)?;
/// assert_eq!(reading.strength, 200);
/// assert_eq!(reading.battery, 4);
/// # Ok::<(), sonar_link::error::SonarLinkError>(())
/// ```
pub fn decode_sample_frame(frame: &[u8], received_at_ms: i64) -> Result<SonarReading> {
    validate_sample_frame(frame)?;
    log_reserved_bytes(frame);

    let flags = frame[offsets::FLAGS];
    let dry = flags & DRY_FLAG != 0;

    let depth = if dry {
        DRY_SENTINEL
    } else {
        FEET_TO_METRES * decode_fixed_point(frame[offsets::DEPTH], frame[offsets::DEPTH + 1])
    };

    let fish_depth = FEET_TO_METRES
        * decode_fixed_point(frame[offsets::FISH_DEPTH], frame[offsets::FISH_DEPTH + 1]);

    let packed = frame[offsets::FISH_AND_BATTERY];
    let fahrenheit = decode_fixed_point(frame[offsets::TEMPERATURE], frame[offsets::TEMPERATURE + 1]);

    Ok(SonarReading {
        time: received_at_ms,
        dry,
        depth,
        strength: frame[offsets::STRENGTH],
        fish_depth,
        fish_strength: packed & 0x0F,
        battery: (packed >> 4) & 0x0F,
        temperature: (fahrenheit - 32.0) * 5.0 / 9.0,
    })
}

fn log_reserved_bytes(frame: &[u8]) {
    for index in [2, 3, 14, 15, 16] {
        if frame[index] != 0 {
            debug!("Unexpected value in reserved byte {}: {}", index, frame[index]);
        }
    }

    if frame[offsets::FLAGS] & !DRY_FLAG != 0 {
        debug!("Unexpected flag bits in byte 4: 0x{:02X}", frame[offsets::FLAGS]);
    }

    if frame[5] != EXPECTED_BYTE_5 {
        debug!("Unexpected value in reserved byte 5: {}", frame[5]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::erchang::encoder::encode_sample_frame;

    fn valid_frame() -> [u8; SAMPLE_FRAME_SIZE] {
        let mut frame = [
            b'S', b'F', 0, 0, 0, 9, // header
            10, 50, // depth 10.50 ft
            200, // strength
            4, 25, // fish depth 4.25 ft
            0x6B, // battery 6, fish strength 11
            50, 0, // 50.00 F
            0, 0, 0, 0,
        ];
        frame[17] = sum8(&frame[..17]);
        frame
    }

    #[test]
    fn test_decode_valid_frame() {
        let reading = decode_sample_frame(&valid_frame(), 1234).unwrap();

        assert_eq!(reading.time, 1234);
        assert!(!reading.dry);
        assert!((reading.depth - 10.5 * 0.3048).abs() < 1e-4);
        assert_eq!(reading.strength, 200);
        assert!((reading.fish_depth - 4.25 * 0.3048).abs() < 1e-4);
        assert_eq!(reading.fish_strength, 11);
        assert_eq!(reading.battery, 6);
        assert!((reading.temperature - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_dry_frame_uses_sentinel() {
        let mut frame = valid_frame();
        frame[4] = DRY_FLAG;
        frame[17] = sum8(&frame[..17]);

        let reading = decode_sample_frame(&frame, 0).unwrap();
        assert!(reading.dry);
        assert_eq!(reading.depth, DRY_SENTINEL);
    }

    #[test]
    fn test_decode_wrong_lengths_are_malformed() {
        let frame = valid_frame();
        for len in [0, 1, 2, 12, 17] {
            match decode_sample_frame(&frame[..len], 0) {
                Err(SonarLinkError::MalformedFrame(_)) => {}
                other => panic!("length {}: expected MalformedFrame, got {:?}", len, other),
            }
        }

        let mut long = frame.to_vec();
        long.push(0);
        assert!(matches!(
            decode_sample_frame(&long, 0),
            Err(SonarLinkError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_bad_signature_is_malformed() {
        for (index, value) in [(0, b'X'), (1, b'G')] {
            let mut frame = valid_frame();
            frame[index] = value;
            frame[17] = sum8(&frame[..17]);
            assert!(matches!(
                decode_sample_frame(&frame, 0),
                Err(SonarLinkError::MalformedFrame(_))
            ));
        }
    }

    #[test]
    fn test_decode_any_single_bit_flip_is_checksum_mismatch() {
        // Identifier bytes are excluded: flipping those is a signature error
        let frame = valid_frame();
        for index in 2..17 {
            for bit in 0..8 {
                let mut corrupted = frame;
                corrupted[index] ^= 1 << bit;
                match decode_sample_frame(&corrupted, 0) {
                    Err(SonarLinkError::ChecksumMismatch { .. }) => {}
                    other => panic!("byte {} bit {}: got {:?}", index, bit, other),
                }
            }
        }
    }

    #[test]
    fn test_decode_corrupt_checksum_byte() {
        let mut frame = valid_frame();
        frame[17] ^= 0xFF;
        let err = decode_sample_frame(&frame, 0).unwrap_err();
        assert!(matches!(err, SonarLinkError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_decode_tolerates_reserved_bytes() {
        let mut frame = valid_frame();
        frame[2] = 1;
        frame[3] = 7;
        frame[4] = 0x41; // unknown flag bits, not dry
        frame[5] = 3;
        frame[14] = 0xFF;
        frame[15] = 1;
        frame[16] = 2;
        frame[17] = sum8(&frame[..17]);

        let reading = decode_sample_frame(&frame, 0).unwrap();
        assert!(!reading.dry);
        assert_eq!(reading.strength, 200);
    }

    #[test]
    fn test_bit_fields_survive_encode_decode() {
        for strength in [0u8, 1, 127, 255] {
            for battery in 0u8..16 {
                for fish_strength in [0u8, 5, 15] {
                    let reading = SonarReading {
                        time: 0,
                        dry: false,
                        depth: 2.0,
                        strength,
                        fish_depth: 1.0,
                        fish_strength,
                        battery,
                        temperature: 15.0,
                    };
                    let decoded = decode_sample_frame(&encode_sample_frame(&reading), 0).unwrap();
                    assert_eq!(decoded.strength, strength);
                    assert_eq!(decoded.battery, battery);
                    assert_eq!(decoded.fish_strength, fish_strength);
                }
            }
        }
    }

    #[test]
    fn test_decode_fixed_point() {
        assert_eq!(decode_fixed_point(0, 0), 0.0);
        assert!((decode_fixed_point(12, 34) - 12.34).abs() < 1e-5);
        assert!((decode_fixed_point(255, 99) - 255.99).abs() < 1e-3);
    }
}
