//! # Erchang Protocol Constants
//!
//! Frame layout and GATT identifiers for Erchang wireless fishfinders.
//!
//! The protocol was reverse engineered by sniffing the vendor's own app, so the
//! meaning of some bytes is still unknown. Those bytes are listed here with the
//! values every observed device sends.

/// First identifier byte in every frame ('S', presumably "Sonar")
pub const ID0: u8 = b'S';

/// Second identifier byte in every frame ('F', presumably "FishFinder")
pub const ID1: u8 = b'F';

/// Configure command code
pub const COMMAND_CONFIGURE: u8 = 1;

/// Configure payload length (sensitivity, noise, range)
pub const CONFIGURE_PAYLOAD_SIZE: u8 = 3;

/// Configure frame size in bytes
pub const CONFIGURE_FRAME_SIZE: usize = 12;

/// Byte index of the configure frame checksum (sum of bytes 0..9)
pub const CONFIGURE_CHECKSUM_INDEX: usize = 9;

/// Telemetry frame size in bytes
pub const SAMPLE_FRAME_SIZE: usize = 18;

/// Byte index of the telemetry frame checksum (sum of bytes 0..17)
pub const SAMPLE_CHECKSUM_INDEX: usize = 17;

/// Dry flag in byte 4 of a telemetry frame
pub const DRY_FLAG: u8 = 0x08;

/// Value byte 5 carries on every device seen so far
pub const EXPECTED_BYTE_5: u8 = 9;

/// Telemetry byte offsets
pub mod offsets {
    pub const FLAGS: usize = 4;
    pub const DEPTH: usize = 6;
    pub const STRENGTH: usize = 8;
    pub const FISH_DEPTH: usize = 9;
    pub const FISH_AND_BATTERY: usize = 11;
    pub const TEMPERATURE: usize = 12;
}

/// Feet to metres
pub const FEET_TO_METRES: f32 = 0.3048;

/// Sonar GATT service (0000fff0-0000-1000-8000-00805f9b34fb)
pub const SERVICE_UUID: u16 = 0xFFF0;

/// Sample notification characteristic
pub const SAMPLE_CHARACTERISTIC_UUID: u16 = 0xFFF1;

/// Configure write characteristic
pub const CONFIGURE_CHARACTERISTIC_UUID: u16 = 0xFFF2;

/// Location characteristic. Never present on a real device, only on bench simulators.
pub const LOCATION_CHARACTERISTIC_UUID: u16 = 0xFFF3;

/// Sensitivity range accepted by the device
pub const SENSITIVITY_MIN: u8 = 1;
pub const SENSITIVITY_MAX: u8 = 10;

/// Noise filter levels: off, low, medium, high, max
pub const NOISE_MAX: u8 = 4;

/// Range selector: 3, 6, 9, 18, 24, 36, auto
pub const RANGE_MAX: u8 = 6;

/// Human-readable labels for each range selector value
pub const RANGE_LABELS: [&str; 7] = ["3", "6", "9", "18", "24", "36", "auto"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(ID0, 0x53);
        assert_eq!(ID1, 0x46);
        assert_eq!(CONFIGURE_FRAME_SIZE, 12);
        assert_eq!(SAMPLE_FRAME_SIZE, 18);
        assert_eq!(SAMPLE_CHECKSUM_INDEX, SAMPLE_FRAME_SIZE - 1);
    }

    #[test]
    fn test_range_labels_cover_selector() {
        assert_eq!(RANGE_LABELS.len(), RANGE_MAX as usize + 1);
        assert_eq!(RANGE_LABELS[RANGE_MAX as usize], "auto");
    }
}
