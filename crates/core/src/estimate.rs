//! Fragment count estimation from raw payload sizes.
//!
//! The estimate is for pre-allocation and progress reporting only. The
//! authoritative count is [`crate::fragment_count`] over the actual encoded
//! payload, which is what the writer records.

/// Base64 expansion factor (4/3, rounded up) expressed in percent.
pub const ENCODING_EXPANSION_PERCENT: u64 = 134;

/// Estimate how many fragments a raw payload of `raw_len` bytes will need.
///
/// Returns `0` for an empty payload (stored inline, not chunked).
pub fn estimate_fragment_count(raw_len: u64, max_fragment_size: usize) -> u64 {
    if raw_len == 0 {
        return 0;
    }
    let estimated_encoded =
        (u128::from(raw_len) * u128::from(ENCODING_EXPANSION_PERCENT)).div_ceil(100);
    let max = max_fragment_size.max(1) as u128;
    u64::try_from(estimated_encoded.div_ceil(max)).unwrap_or(u64::MAX)
}

/// Exact length of the padded base64 encoding of `raw_len` bytes.
pub fn encoded_len(raw_len: u64) -> u64 {
    raw_len.div_ceil(3).saturating_mul(4)
}
