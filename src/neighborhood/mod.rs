//! User-user neighborhood collaborative filtering.
//!
//! Pairwise cosine similarity over the rows of the normalized rating
//! matrix, k-nearest-neighbor selection, and similarity-weighted rating
//! prediction at held-out positions, optionally corrected by per-user mean
//! ratings (the baseline approach).

use anyhow::bail;
use log::{debug, info};
use nalgebra_sparse::CsrMatrix;
use ndarray::Array2;

use crate::sparse::{MatrixDense, MatrixNonZero, MatrixSum};
use crate::utils::nan_to_zero;

/// Diagonal sentinel, below any valid cosine, so a row never ranks as its
/// own neighbor.
pub const SELF_SIMILARITY: f64 = -2.0;

const PREDICTION_LOG_INTERVAL: usize = 40_000;

/// Global, per-user and per-item mean ratings, each computed over stored
/// entries only. A user or item without any rating gets mean 0.
pub struct RatingMeans {
    pub global: f64,
    pub user: Vec<f64>,
    pub item: Vec<f64>,
}

impl RatingMeans {
    pub fn from_matrix(matrix: &CsrMatrix<f64>) -> anyhow::Result<Self> {
        let row_sums: Vec<f64> = matrix.sum_row()?;
        let row_counts: Vec<u32> = matrix.nonzero_row()?;
        let col_sums: Vec<f64> = matrix.sum_col()?;
        let col_counts: Vec<u32> = matrix.nonzero_col()?;

        let global = if matrix.nnz() > 0 {
            matrix.sum_all::<f64>()? / matrix.nnz() as f64
        } else {
            0.0
        };
        let user = row_sums
            .iter()
            .zip(&row_counts)
            .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
            .collect();
        let item = col_sums
            .iter()
            .zip(&col_counts)
            .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
            .collect();

        Ok(RatingMeans { global, user, item })
    }
}

pub struct NeighborhoodPredictor {
    k: usize,
    baseline: bool,
}

impl NeighborhoodPredictor {
    /// Pairwise cosine similarity between the rows of `matrix`.
    ///
    /// One sparse matrix-transpose product supplies every dot product; the
    /// result is exactly symmetric, NaN from zero-norm rows is replaced by
    /// zero and the diagonal is forced to [`SELF_SIMILARITY`]. Time and
    /// memory are O(nrows²).
    pub fn similarity(matrix: &CsrMatrix<f64>) -> anyhow::Result<Array2<f64>> {
        let n = matrix.nrows();
        let norms: Vec<f64> = matrix.norm_row()?;
        let transposed = matrix.transpose();
        let products = matrix * &transposed;

        let mut sim = Array2::zeros((n, n));
        for i in 0..n {
            sim[[i, i]] = SELF_SIMILARITY;
        }
        for (i, j, &dot) in products.triplet_iter() {
            if i < j {
                let cosine = dot / (norms[i] * norms[j]);
                let cosine = if cosine.is_nan() { 0.0 } else { cosine };
                sim[[i, j]] = cosine;
                sim[[j, i]] = cosine;
            }
        }
        Ok(sim)
    }

    /// Indices of the `k` most similar rows for every row, most-similar
    /// first. Ties break on the lower index. The self-similarity sentinel
    /// keeps a row out of its own neighborhood as long as `k < nrows`.
    pub fn neighbors(similarity: &Array2<f64>, k: usize) -> anyhow::Result<Array2<usize>> {
        let n = similarity.nrows();
        if k >= n {
            bail!(
                "neighborhood size {} must be smaller than the number of rows {}",
                k,
                n
            );
        }
        let mut table = Array2::zeros((n, k));
        let mut order: Vec<usize> = Vec::with_capacity(n);
        for i in 0..n {
            order.clear();
            order.extend(0..n);
            order.sort_by(|&a, &b| {
                similarity[[i, b]]
                    .partial_cmp(&similarity[[i, a]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for (j, &neighbor) in order.iter().take(k).enumerate() {
                table[[i, j]] = neighbor;
            }
        }
        Ok(table)
    }

    /// Predicts ratings at `test_entries`.
    ///
    /// The result is a dense copy of `original` in which only the test
    /// positions are overwritten; neighbor ratings are always read from the
    /// pristine original matrix. A zero similarity sum yields NaN locally,
    /// replaced by zero in the returned matrix.
    pub fn predict(
        &self,
        normalized: &CsrMatrix<f64>,
        original: &CsrMatrix<f64>,
        test_entries: &[(usize, usize)],
    ) -> anyhow::Result<Array2<f64>> {
        let sim = Self::similarity(normalized)?;
        let hood = Self::neighbors(&sim, self.k)?;
        debug!(
            "similarity and neighborhoods ready for {} rows, k = {}",
            sim.nrows(),
            self.k
        );

        let ratings = original.to_dense();
        let mut predicted = ratings.clone();
        let means = if self.baseline {
            Some(RatingMeans::from_matrix(original)?)
        } else {
            None
        };

        for (i, &(r, c)) in test_entries.iter().enumerate() {
            if r >= ratings.nrows() || c >= ratings.ncols() {
                bail!(
                    "test entry ({}, {}) lies outside the {}x{} rating matrix",
                    r,
                    c,
                    ratings.nrows(),
                    ratings.ncols()
                );
            }
            let mut weighted = 0.0;
            let mut weight_sum = 0.0;
            for j in 0..self.k {
                let neighbor = hood[[r, j]];
                let weight = sim[[r, neighbor]];
                let rating = ratings[[neighbor, c]];
                weighted += weight
                    * match &means {
                        Some(m) => rating - m.user[neighbor],
                        None => rating,
                    };
                weight_sum += weight;
            }
            let base = means.as_ref().map_or(0.0, |m| m.user[r]);
            predicted[[r, c]] = base + weighted / weight_sum;

            if (i + 1) % PREDICTION_LOG_INTERVAL == 0 || i + 1 == test_entries.len() {
                info!("predicted {} of {} ratings", i + 1, test_entries.len());
            }
        }

        nan_to_zero(&mut predicted);
        Ok(predicted)
    }
}

/// Builder for [`NeighborhoodPredictor`]. Defaults: `k` = 150 neighbors,
/// plain (non-baseline) predictions.
pub struct NeighborhoodPredictorBuilder {
    k: usize,
    baseline: bool,
}

impl Default for NeighborhoodPredictorBuilder {
    fn default() -> Self {
        Self {
            k: 150,
            baseline: false,
        }
    }
}

impl NeighborhoodPredictorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the neighborhood size. Must stay below the number of users.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Predict deviations from per-user mean rating instead of absolute
    /// ratings.
    pub fn baseline(mut self, baseline: bool) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn build(self) -> NeighborhoodPredictor {
        NeighborhoodPredictor {
            k: self.k,
            baseline: self.baseline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra_sparse::CooMatrix;

    fn matrix_from_triplets(
        rows: usize,
        cols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(rows, cols);
        for &(r, c, v) in triplets {
            coo.push(r, c, v);
        }
        CsrMatrix::from(&coo)
    }

    fn overlap_fixture() -> CsrMatrix<f64> {
        // rows 0 and 1 point the same way, row 2 the opposite way
        matrix_from_triplets(
            3,
            2,
            &[
                (0, 0, 2.0),
                (0, 1, -2.0),
                (1, 0, 1.0),
                (1, 1, -1.0),
                (2, 0, -1.0),
                (2, 1, 1.0),
            ],
        )
    }

    #[test]
    fn test_similarity_is_symmetric_with_sentinel_diagonal() {
        let m = overlap_fixture();
        let sim = NeighborhoodPredictor::similarity(&m).unwrap();
        for i in 0..3 {
            assert_eq!(sim[[i, i]], SELF_SIMILARITY);
            for j in 0..3 {
                assert_eq!(sim[[i, j]], sim[[j, i]]);
            }
        }
        assert_abs_diff_eq!(sim[[0, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sim[[0, 2]], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_similarity_zero_norm_rows_get_zero() {
        // row 1 has no ratings at all
        let m = matrix_from_triplets(3, 2, &[(0, 0, 1.0), (2, 0, 1.0)]);
        let sim = NeighborhoodPredictor::similarity(&m).unwrap();
        assert_eq!(sim[[0, 1]], 0.0);
        assert_eq!(sim[[1, 2]], 0.0);
        assert_abs_diff_eq!(sim[[0, 2]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_neighbors_exclude_self_and_rank_descending() {
        let m = overlap_fixture();
        let sim = NeighborhoodPredictor::similarity(&m).unwrap();
        let hood = NeighborhoodPredictor::neighbors(&sim, 2).unwrap();
        for i in 0..3 {
            let row: Vec<usize> = (0..2).map(|j| hood[[i, j]]).collect();
            assert!(!row.contains(&i));
            assert_ne!(row[0], row[1]);
            assert!(sim[[i, row[0]]] >= sim[[i, row[1]]]);
        }
        // row 0: most similar is row 1 (cosine 1), then row 2 (cosine -1)
        assert_eq!(hood[[0, 0]], 1);
        assert_eq!(hood[[0, 1]], 2);
    }

    #[test]
    fn test_neighbors_reject_oversized_k() {
        let m = overlap_fixture();
        let sim = NeighborhoodPredictor::similarity(&m).unwrap();
        assert!(NeighborhoodPredictor::neighbors(&sim, 3).is_err());
    }

    #[test]
    fn test_rating_means_use_stored_entries_only() {
        let m = matrix_from_triplets(3, 3, &[(0, 0, 4.0), (0, 2, 2.0), (2, 2, 3.0)]);
        let means = RatingMeans::from_matrix(&m).unwrap();
        assert_abs_diff_eq!(means.global, 3.0);
        assert_abs_diff_eq!(means.user[0], 3.0);
        assert_abs_diff_eq!(means.user[1], 0.0);
        assert_abs_diff_eq!(means.user[2], 3.0);
        assert_abs_diff_eq!(means.item[0], 4.0);
        assert_abs_diff_eq!(means.item[1], 0.0);
        assert_abs_diff_eq!(means.item[2], 2.5);
    }

    #[test]
    fn test_predict_overwrites_only_test_positions() {
        let m = overlap_fixture();
        let predictor = NeighborhoodPredictorBuilder::new().k(1).build();
        let predicted = predictor.predict(&m, &m, &[(0, 0)]).unwrap();
        // neighbor of row 0 is row 1 with similarity 1 -> predicts row 1's rating
        assert_abs_diff_eq!(predicted[[0, 0]], 1.0, epsilon = 1e-12);
        // untouched positions keep ground truth
        assert_eq!(predicted[[0, 1]], -2.0);
        assert_eq!(predicted[[2, 1]], 1.0);
    }

    #[test]
    fn test_baseline_reduces_to_plain_when_user_means_vanish() {
        // every row of the fixture sums to zero, so per-user means are zero
        let m = overlap_fixture();
        let entries = [(0, 0), (1, 0), (2, 1)];
        let plain = NeighborhoodPredictorBuilder::new().k(1).build();
        let baseline = NeighborhoodPredictorBuilder::new()
            .k(1)
            .baseline(true)
            .build();
        let p = plain.predict(&m, &m, &entries).unwrap();
        let b = baseline.predict(&m, &m, &entries).unwrap();
        for &(r, c) in &entries {
            assert_abs_diff_eq!(p[[r, c]], b[[r, c]], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_similarity_neighborhood_predicts_zero() {
        let _ = env_logger::builder().is_test(true).try_init();
        // orthogonal rows: every off-diagonal similarity is zero
        let m = matrix_from_triplets(
            4,
            4,
            &[(0, 0, 5.0), (1, 1, 3.0), (2, 2, 4.0), (3, 3, 2.0)],
        );
        let predictor = NeighborhoodPredictorBuilder::new().k(2).build();
        let predicted = predictor.predict(&m, &m, &[(0, 0), (1, 1)]).unwrap();
        assert_eq!(predicted[[0, 0]], 0.0);
        assert_eq!(predicted[[1, 1]], 0.0);
    }

    #[test]
    fn test_predict_rejects_out_of_bounds_entry() {
        let m = overlap_fixture();
        let predictor = NeighborhoodPredictorBuilder::new().k(1).build();
        assert!(predictor.predict(&m, &m, &[(5, 0)]).is_err());
    }
}
