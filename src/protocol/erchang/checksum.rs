//! # Additive Checksum
//!
//! Erchang frames carry a single checksum byte: the sum of the covered bytes,
//! modulo 256. Any single-bit change in the covered range changes the sum.

/// Sum bytes modulo 256
///
/// # Examples
///
/// ```
/// use sonar_link::protocol::erchang::checksum::sum8;
///
/// assert_eq!(sum8(&[0xFF, 0x02]), 0x01);
/// ```
pub fn sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}
