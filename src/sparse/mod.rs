use std::ops::AddAssign;

use anyhow::anyhow;
use nalgebra_sparse::CsrMatrix;
use ndarray::Array2;
use num_traits::{Float, NumCast, PrimInt, Unsigned, Zero};

use crate::NumericOps;

pub trait MatrixNonZero {
    /// Number of stored entries in each row.
    fn nonzero_row<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: PrimInt + Unsigned + Zero + AddAssign;

    /// Number of stored entries in each column.
    fn nonzero_col<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: PrimInt + Unsigned + Zero + AddAssign;
}

pub trait MatrixSum {
    type Item: NumCast;

    fn sum_row<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;

    fn sum_col<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;

    /// Sum over every stored entry of the matrix.
    fn sum_all<T>(&self) -> anyhow::Result<T>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;

    fn sum_row_squared<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;

    fn sum_col_squared<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum;

    /// Euclidean norm of each row.
    fn norm_row<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        Ok(self
            .sum_row_squared::<T>()?
            .into_iter()
            .map(|v| v.sqrt())
            .collect())
    }
}

pub trait MatrixDense {
    type Item;

    /// Materializes the matrix as a dense `ndarray` array. Memory is
    /// O(nrows × ncols); callers are expected to bound matrix size.
    fn to_dense(&self) -> Array2<Self::Item>;

    /// Positions of the stored entries, in row-major order.
    fn nonzero_entries(&self) -> Vec<(usize, usize)>;
}

impl<M: NumericOps> MatrixNonZero for CsrMatrix<M> {
    fn nonzero_row<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: PrimInt + Unsigned + Zero + AddAssign,
    {
        self.row_offsets()
            .windows(2)
            .map(|window| {
                let diff = window[1]
                    .checked_sub(window[0])
                    .ok_or_else(|| anyhow!("Subtraction overflow"))?;
                T::from(diff).ok_or_else(|| anyhow!("Failed to convert to target type"))
            })
            .collect()
    }

    fn nonzero_col<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: PrimInt + Unsigned + Zero + AddAssign,
    {
        let mut result = vec![T::zero(); self.ncols()];
        for &col_index in self.col_indices() {
            result[col_index] += T::one();
        }
        Ok(result)
    }
}

impl<M: NumericOps> MatrixSum for CsrMatrix<M> {
    type Item = M;

    fn sum_row<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        let mut result = vec![T::zero(); self.nrows()];
        for (row, row_vec) in self.row_iter().enumerate() {
            result[row] = row_vec
                .values()
                .iter()
                .map(|&v| T::from(v).ok_or_else(|| anyhow!("Failed to convert to target type")))
                .sum::<anyhow::Result<T>>()?;
        }
        Ok(result)
    }

    fn sum_col<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        let mut result = vec![T::zero(); self.ncols()];
        for (&col_index, &value) in self.col_indices().iter().zip(self.values().iter()) {
            result[col_index] +=
                T::from(value).ok_or_else(|| anyhow!("Failed to convert to target type"))?;
        }
        Ok(result)
    }

    fn sum_all<T>(&self) -> anyhow::Result<T>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        let mut total = T::zero();
        for &value in self.values() {
            total += T::from(value).ok_or_else(|| anyhow!("Failed to convert to target type"))?;
        }
        Ok(total)
    }

    fn sum_row_squared<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        let mut result = vec![T::zero(); self.nrows()];
        for (row, row_vec) in self.row_iter().enumerate() {
            for &value in row_vec.values() {
                let v =
                    T::from(value).ok_or_else(|| anyhow!("Failed to convert to target type"))?;
                result[row] += v * v;
            }
        }
        Ok(result)
    }

    fn sum_col_squared<T>(&self) -> anyhow::Result<Vec<T>>
    where
        T: Float + NumCast + AddAssign + std::iter::Sum,
    {
        let mut result = vec![T::zero(); self.ncols()];
        for (&col_index, &value) in self.col_indices().iter().zip(self.values().iter()) {
            let v = T::from(value).ok_or_else(|| anyhow!("Failed to convert to target type"))?;
            result[col_index] += v * v;
        }
        Ok(result)
    }
}

impl<M> MatrixDense for CsrMatrix<M>
where
    M: NumericOps + Zero,
{
    type Item = M;

    fn to_dense(&self) -> Array2<M> {
        let mut dense = Array2::zeros((self.nrows(), self.ncols()));
        for (row, col, &value) in self.triplet_iter() {
            dense[[row, col]] = value;
        }
        dense
    }

    fn nonzero_entries(&self) -> Vec<(usize, usize)> {
        self.triplet_iter().map(|(row, col, _)| (row, col)).collect()
    }
}
