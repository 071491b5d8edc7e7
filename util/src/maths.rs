//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Return the euclidian norm (magnitude) of a vector given as a slice.
///
/// Components are scaled by the largest one before squaring, so the result
/// only overflows if the magnitude itself does not fit in `T`. A NaN
/// component gives NaN.
pub fn magnitude<T>(values: &[T]) -> T
where
    T: Float,
{
    let scale = values.iter().fold(T::zero(), |acc, v| {
        if v.is_nan() || v.abs() > acc {
            v.abs()
        } else {
            acc
        }
    });

    if scale == T::zero() || !scale.is_finite() {
        return scale;
    }

    values
        .iter()
        .fold(T::zero(), |acc, v| acc + (*v / scale).powi(2))
        .sqrt()
        * scale
}

/// Return the sum of the absolute values of each element.
pub fn abs_sum<T>(values: &[T]) -> T
where
    T: Float,
{
    values.iter().fold(T::zero(), |acc, v| acc + v.abs())
}

/// Scale `values` in place so that its magnitude does not exceed `max_len`.
///
/// Vectors already within the limit are left untouched, bit for bit. Returns
/// `true` if the vector was scaled.
pub fn cap_to_magnitude<T>(values: &mut [T], max_len: T) -> bool
where
    T: Float,
{
    let len = magnitude(values);

    if len <= max_len {
        return false;
    }

    let ratio = max_len / len;
    for v in values.iter_mut() {
        *v = *v * ratio;
    }

    true
}

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
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
