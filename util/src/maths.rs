//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_to_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let wrapped = rem_euclid(angle + pi_t, tau_t) - pi_t;

    // Round-off in rem_euclid can land exactly on +pi
    if wrapped >= pi_t { wrapped - tau_t } else { wrapped }
}

/// Wrap an angle into the range [0, 2pi).
pub fn wrap_to_2pi<T>(angle: T) -> T
where
    T: Float
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let wrapped = rem_euclid(angle, tau_t);

    if wrapped >= tau_t { T::zero() } else { wrapped }
}

/// Get the signed shortest angular distance required to move from `from` to
/// `to`, accounting for wrapping.
///
/// The result is in the range [-pi, pi). Positive values are anticlockwise.
pub fn get_ang_dist<T>(from: T, to: T) -> T
where
    T: Float
{
    wrap_to_pi(to - from)
}

/// Snap values whose magnitude is below `threshold` to zero.
///
/// Values at or above the threshold are passed through unscaled.
pub fn apply_deadband<T>(value: T, threshold: T) -> T
where
    T: Float
{
    if value.abs() < threshold { T::zero() } else { value }
}

/// Sign of a value, returning zero for zero rather than the sign bit.
pub fn signum_or_zero<T>(value: T) -> T
where
    T: Float
{
    if value == T::zero() { T::zero() } else { value.signum() }
}

#[cfg(test)]
mod test {
    use super::*;

    const TAU: f64 = std::f64::consts::TAU;
    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_get_ang_dist() {
        assert!((get_ang_dist(1f64, 2f64) - 1f64).abs() < 1e-12);
        assert!((get_ang_dist(2f64, 1f64) + 1f64).abs() < 1e-12);
        assert!(get_ang_dist(0f64, TAU).abs() < 1e-12);
        assert!(get_ang_dist(TAU, 0f64).abs() < 1e-12);
        assert!((get_ang_dist(1f64, TAU) + 1f64).abs() < 1e-12);
        assert!((get_ang_dist(TAU - 1f64, 1f64) - 2f64).abs() < 1e-12);
        assert!((get_ang_dist(0.1, -0.1 + 10.0 * TAU) + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap_to_pi(PI), -PI);
        assert!((wrap_to_pi(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_to_pi(-5.0 * TAU + 0.5) - 0.5).abs() < 1e-9);
        assert!((wrap_to_2pi(-PI / 2.0) - 3.0 * PI / 2.0).abs() < 1e-12);
        assert_eq!(wrap_to_2pi(TAU), 0.0);
    }

    #[test]
    fn test_deadband() {
        assert_eq!(apply_deadband(0.04, 0.05), 0.0);
        assert_eq!(apply_deadband(-0.04, 0.05), 0.0);
        assert_eq!(apply_deadband(0.05, 0.05), 0.05);
        assert_eq!(apply_deadband(-0.6, 0.05), -0.6);
    }

    #[test]
    fn test_signum_or_zero() {
        assert_eq!(signum_or_zero(0.0), 0.0);
        assert_eq!(signum_or_zero(-0.0), 0.0);
        assert_eq!(signum_or_zero(-3.2), -1.0);
        assert_eq!(signum_or_zero(0.1), 1.0);
    }
}
