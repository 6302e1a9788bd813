//! Numeric utilities: safe and centralized integer conversions.
//!
//! Offsets on the wire are `u64`; indexes into in-memory buffers are
//! `usize`. Conversions between the two go through these helpers so call
//! sites stay consistent and searchable.

#[inline]
#[must_use]
pub fn u64_to_usize(v: u64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    v as u64
}

#[inline]
#[must_use]
pub fn u32_to_usize(v: u32) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_to_usize_matches_std_try_from() {
        for &v in &[0u64, 1, 42, u64::from(u32::MAX), u64::from(u32::MAX) + 1] {
            assert_eq!(u64_to_usize(v), usize::try_from(v).ok());
        }
    }

    #[test]
    fn usize_to_u64_is_lossless() {
        for &v in &[0usize, 1, 42, 10_000] {
            assert_eq!(usize_to_u64(v) as usize, v);
        }
    }
}
