//! 16-bit PCM byte conversions.
//!
//! Audio payloads handed to the receive callback are interpreted as signed
//! 16-bit little-endian samples, interleaved by channel.

/// Decodes little-endian i16 samples; a trailing odd byte is ignored.
pub fn samples_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    // ---
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encodes samples as little-endian bytes.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    // ---
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
