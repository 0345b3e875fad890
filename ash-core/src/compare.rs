//! Constant-time equality for proof comparison (spec §4.6).

use subtle::ConstantTimeEq;

/// Compare two byte strings in time independent of the position of the
/// first differing byte. Unequal lengths return `false` immediately —
/// length is not secret, only content is.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Convenience wrapper for UTF-8 proof strings.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}
