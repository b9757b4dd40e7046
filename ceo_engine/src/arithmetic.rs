//! Quarter Engine: Arithmetic Primitives
//!
//! Integer only. Meter math widens to i64 before clamping so that no delta
//! can wrap, and money is always i64.

use crate::error::ContentError;

/// Lowest value any meter can hold.
pub const METER_MIN: i32 = 0;
/// Highest value any meter can hold.
pub const METER_MAX: i32 = 100;

/// Clamp a widened meter value into `[METER_MIN, METER_MAX]`.
pub fn clamp_meter(value: i64) -> i32 {
    value.clamp(METER_MIN as i64, METER_MAX as i64) as i32
}

/// Checked integer addition. Panics on i64 overflow.
pub fn checked_add(a: i64, b: i64) -> i64 {
    match a.checked_add(b) {
        Some(result) => result,
        None => panic!("Overflow: {} + {} overflows i64", a, b),
    }
}

/// Checked integer multiplication. Panics on i64 overflow.
pub fn checked_mul(a: i64, b: i64) -> i64 {
    match a.checked_mul(b) {
        Some(result) => result,
        None => panic!("Overflow: {} * {} overflows i64", a, b),
    }
}

/// Integer division rounding toward positive infinity, for non-negative inputs.
pub fn ceil_div(numerator: i32, denominator: i32) -> i32 {
    debug_assert!(numerator >= 0 && denominator > 0);
    (numerator + denominator - 1) / denominator
}

/// Clamp a percentage chance into `[lo, hi]`.
pub fn clamp_percent(value: i32, lo: u32, hi: u32) -> u32 {
    value.clamp(lo as i32, hi as i32) as u32
}

/// Validate that a content id matches `[a-zA-Z0-9_-]+`.
pub fn validate_id(id: &str) -> Result<(), ContentError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(ContentError::InvalidId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_meter_bounds() {
        assert_eq!(clamp_meter(-5), 0);
        assert_eq!(clamp_meter(42), 42);
        assert_eq!(clamp_meter(250), 100);
        assert_eq!(clamp_meter(i64::MIN), 0);
    }

    #[test]
    fn test_checked_add_ok() {
        assert_eq!(checked_add(3, 4), 7);
        assert_eq!(checked_add(-10, 5), -5);
    }

    #[test]
    #[should_panic(expected = "Overflow")]
    fn test_checked_add_overflow() {
        checked_add(i64::MAX, 1);
    }

    #[test]
    #[should_panic(expected = "Overflow")]
    fn test_checked_mul_overflow() {
        checked_mul(i64::MAX, 2);
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(0, 2), 0);
        assert_eq!(ceil_div(3, 2), 2);
        assert_eq!(ceil_div(4, 2), 2);
    }

    #[test]
    fn test_clamp_percent() {
        assert_eq!(clamp_percent(10, 30, 90), 30);
        assert_eq!(clamp_percent(120, 30, 90), 90);
        assert_eq!(clamp_percent(45, 30, 90), 45);
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("hire_spree").is_ok());
        assert!(validate_id("A-B_c-3").is_ok());
        assert_eq!(
            validate_id("with spaces"),
            Err(ContentError::InvalidId("with spaces".to_string()))
        );
        assert!(validate_id("").is_err());
    }
}
