//! # Erchang Frame Encoder
//!
//! Encodes configure commands sent to the device, and telemetry frames as the
//! device would send them (used by the bench simulator).

use super::checksum::sum8;
use super::constants::*;
use crate::protocol::SonarReading;

/// Encode a configure command frame
///
/// # Arguments
///
/// * `sensitivity` - Receiver sensitivity (1-10)
/// * `noise` - Noise filter level (0-4)
/// * `range` - Range selector (0-6, 6 = auto)
///
/// # Returns
///
/// * `[u8; 12]` - `S F 0 0 cmd len sensitivity noise range checksum 0 0`
///
/// # Examples
///
/// ```
/// use sonar_link::protocol::erchang::encoder::encode_configure_frame;
///
/// let frame = encode_configure_frame(5, 2, 3);
/// assert_eq!(frame, [b'S', b'F', 0, 0, 1, 3, 5, 2, 3, 0xA7, 0, 0]);
/// ```
pub fn encode_configure_frame(sensitivity: u8, noise: u8, range: u8) -> [u8; CONFIGURE_FRAME_SIZE] {
    let mut frame = [
        ID0,
        ID1,
        0,
        0,
        COMMAND_CONFIGURE,
        CONFIGURE_PAYLOAD_SIZE,
        sensitivity,
        noise,
        range,
        0, // checksum
        0, // bytes 10 and 11 may do more, never seen non-zero
        0,
    ];
    frame[CONFIGURE_CHECKSUM_INDEX] = sum8(&frame[..CONFIGURE_CHECKSUM_INDEX]);
    frame
}

/// Encode a value as an integer byte plus a hundredths byte
///
/// Values outside 0.00-255.99 saturate.
pub fn encode_fixed_point(value: f32) -> (u8, u8) {
    let clamped = value.clamp(0.0, 255.99);
    let mut real = clamped.trunc();
    let mut hundredths = ((clamped - real) * 100.0).round();
    if hundredths >= 100.0 {
        real += 1.0;
        hundredths = 0.0;
    }
    if real > 255.0 {
        return (255, 99);
    }
    (real as u8, hundredths as u8)
}

/// Encode a telemetry frame carrying `reading`
///
/// Depth and fish depth are converted to feet, temperature to Fahrenheit.
/// Reserved bytes take the values real devices send.
pub fn encode_sample_frame(reading: &SonarReading) -> [u8; SAMPLE_FRAME_SIZE] {
    let mut frame = [0u8; SAMPLE_FRAME_SIZE];
    frame[0] = ID0;
    frame[1] = ID1;
    frame[offsets::FLAGS] = if reading.dry { DRY_FLAG } else { 0 };
    frame[5] = EXPECTED_BYTE_5;

    let depth = if reading.dry { 0.0 } else { reading.depth / FEET_TO_METRES };
    let (real, frac) = encode_fixed_point(depth);
    frame[offsets::DEPTH] = real;
    frame[offsets::DEPTH + 1] = frac;

    frame[offsets::STRENGTH] = reading.strength;

    let (real, frac) = encode_fixed_point(reading.fish_depth / FEET_TO_METRES);
    frame[offsets::FISH_DEPTH] = real;
    frame[offsets::FISH_DEPTH + 1] = frac;

    frame[offsets::FISH_AND_BATTERY] = ((reading.battery & 0x0F) << 4) | (reading.fish_strength & 0x0F);

    let fahrenheit = reading.temperature * 9.0 / 5.0 + 32.0;
    let (real, frac) = encode_fixed_point(fahrenheit);
    frame[offsets::TEMPERATURE] = real;
    frame[offsets::TEMPERATURE + 1] = frac;

    frame[SAMPLE_CHECKSUM_INDEX] = sum8(&frame[..SAMPLE_CHECKSUM_INDEX]);
    frame
}
