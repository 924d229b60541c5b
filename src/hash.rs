//! Content-independent path hash used to index the cache's open-addressed
//! table. djb2-style, 64-bit, wraps on overflow.

/// `h = 0; for each byte b: h = h * 31 + b`, computed with wrapping u64
/// arithmetic.
pub fn path_hash(path: &str) -> u64 {
    path.as_bytes()
        .iter()
        .fold(0u64, |h, &b| h.wrapping_mul(31).wrapping_add(b as u64))
}
