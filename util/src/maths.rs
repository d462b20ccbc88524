//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Clamp the magnitude of a value to `max_abs`, keeping its sign.
pub fn clamp_abs<T>(value: T, max_abs: T) -> T
where
    T: Float
{
    clamp(&value, &-max_abs.abs(), &max_abs.abs())
}

/// Treat values smaller in magnitude than `eps` as exactly zero.
pub fn zero_small<T>(value: T, eps: T) -> T
where
    T: Float
{
    if value.abs() < eps {
        T::zero()
    }
    else {
        value
    }
}

/// Wrap an angle in degrees into the range `[-180, 180)`.
pub fn wrap_deg_180<T>(value: T) -> T
where
    T: Float
{
    let full = T::from(360.0).unwrap_or_else(T::zero);
    let half = T::from(180.0).unwrap_or_else(T::zero);

    rem_euclid(value + half, full) - half
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp_abs() {
        assert_eq!(clamp_abs(150f64, 100f64), 100f64);
        assert_eq!(clamp_abs(-150f64, 100f64), -100f64);
        assert_eq!(clamp_abs(-42f64, 100f64), -42f64);
    }

    #[test]
    fn test_zero_small() {
        assert_eq!(zero_small(1e-9f64, 1e-6), 0.0);
        assert_eq!(zero_small(-0.5f64, 1e-6), -0.5);
    }

    #[test]
    fn test_wrap_deg_180() {
        assert_eq!(wrap_deg_180(190f64), -170f64);
        assert_eq!(wrap_deg_180(-190f64), 170f64);
        assert_eq!(wrap_deg_180(180f64), -180f64);
        assert_eq!(wrap_deg_180(45f64), 45f64);
    }
}
