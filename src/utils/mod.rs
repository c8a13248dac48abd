use nalgebra::Scalar;
use ndarray::Array2;
use num_traits::{Float, NumCast};
use std::iter::Sum;
use std::ops::AddAssign;

pub trait NumericOps: Scalar + Copy + NumCast + PartialOrd {}

impl<T> NumericOps for T where T: Scalar + Copy + NumCast + PartialOrd {}

pub trait FloatOps: NumericOps + Float + AddAssign + Sum {}

impl<T> FloatOps for T where T: NumericOps + Float + AddAssign + Sum {}

/// Replaces every NaN entry with zero, in place.
///
/// Degenerate arithmetic (zero norms, zero similarity sums, zero singular
/// values) produces NaN locally; output matrices are cleaned with this
/// before they are returned.
pub fn nan_to_zero(matrix: &mut Array2<f64>) {
    matrix.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nan_to_zero() {
        let mut arr = array![[1.0, f64::NAN], [f64::NAN, -2.5]];
        nan_to_zero(&mut arr);
        assert_eq!(arr, array![[1.0, 0.0], [0.0, -2.5]]);
    }

    #[test]
    fn test_nan_to_zero_keeps_infinities() {
        let mut arr = array![[f64::INFINITY, 0.0]];
        nan_to_zero(&mut arr);
        assert_eq!(arr[[0, 0]], f64::INFINITY);
    }
}
