//! CUR decomposition via importance sampling.
//!
//! Approximates a sparse matrix from actual sampled columns (C) and rows (R)
//! plus a small pseudo-inverse core (U) built from the decomposition of
//! their intersection.

use anyhow::bail;
use log::debug;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::sparse::{MatrixDense, MatrixSum};
use crate::svd::TruncatedSvd;
use crate::utils::nan_to_zero;

/// Builds the intersection matrix `W[i, j] = matrix[rows[i], cols[j]]`.
/// Zero-valued intersections are never stored.
pub fn intersection(
    matrix: &CsrMatrix<f64>,
    rows: &[usize],
    cols: &[usize],
) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(rows.len(), cols.len());
    for (i, &r) in rows.iter().enumerate() {
        for (j, &c) in cols.iter().enumerate() {
            let value = matrix
                .get_entry(r, c)
                .map(|entry| entry.into_value())
                .unwrap_or(0.0);
            if value != 0.0 {
                coo.push(i, j, value);
            }
        }
    }
    CsrMatrix::from(&coo)
}

struct ScaledSelection {
    /// Selected columns, rescaled, laid out as an (nrows × sample_size) matrix.
    matrix: CsrMatrix<f64>,
    /// Source column indices, ascending.
    indices: Vec<usize>,
}

/// Samples `sample_size` columns without replacement, uniformly among the
/// columns with nonzero squared-Frobenius mass. Each selected column `j` is
/// rescaled by `1 / sqrt(sample_size · p(j))` where `p(j)` is the column's
/// share of the total squared mass.
fn select_scaled(
    matrix: &CsrMatrix<f64>,
    sample_size: usize,
    rng: &mut ChaCha8Rng,
) -> anyhow::Result<ScaledSelection> {
    let squared: Vec<f64> = matrix.sum_col_squared()?;
    let total: f64 = squared.iter().sum();
    let eligible: Vec<(usize, f64)> = squared
        .iter()
        .enumerate()
        .filter(|&(_, &sq)| sq > 0.0)
        .map(|(c, &sq)| (c, sq / total))
        .collect();
    if eligible.len() < sample_size {
        bail!(
            "cannot sample {} columns: only {} carry nonzero mass",
            sample_size,
            eligible.len()
        );
    }

    let mut picked: Vec<(usize, f64)> = rand::seq::index::sample(rng, eligible.len(), sample_size)
        .iter()
        .map(|i| eligible[i])
        .collect();
    picked.sort_by_key(|&(col, _)| col);

    let csc = CscMatrix::from(matrix);
    let mut coo = CooMatrix::new(matrix.nrows(), sample_size);
    for (i, &(col, prob)) in picked.iter().enumerate() {
        let scale = 1.0 / (sample_size as f64 * prob).sqrt();
        let lane = csc.col(col);
        for (&row, &value) in lane.row_indices().iter().zip(lane.values()) {
            coo.push(row, i, value * scale);
        }
    }

    Ok(ScaledSelection {
        matrix: CsrMatrix::from(&coo),
        indices: picked.into_iter().map(|(col, _)| col).collect(),
    })
}

/// CUR decomposition with a caller-supplied sample size, core rank and
/// energy level. Sampling is driven by an injected seed so repeated runs
/// are reproducible; approximation error decreases (statistically) as
/// `sample_size` grows.
pub struct Cur {
    sample_size: usize,
    rank: usize,
    energy: f64,
    random_seed: u64,
}

impl Cur {
    pub fn new(sample_size: usize, rank: usize, energy: f64) -> Self {
        Cur {
            sample_size,
            rank,
            energy,
            random_seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Computes the dense CUR approximation `C · U · R` of `matrix`.
    ///
    /// The core `U = Yᵗᵀ · diag(1/z)² · Xᵀ` comes from the truncated
    /// decomposition `(X, z, Yᵗ)` of the intersection matrix W, so `rank`
    /// must stay below W's rank or zero singular values poison the
    /// reciprocal; NaN entries in the result are replaced by zero.
    pub fn approximate(&self, matrix: &CsrMatrix<f64>) -> anyhow::Result<Array2<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_seed);

        let columns = select_scaled(matrix, self.sample_size, &mut rng)?;
        let transposed = matrix.transpose();
        let rows = select_scaled(&transposed, self.sample_size, &mut rng)?;
        debug!(
            "sampled {} columns and {} rows for CUR",
            columns.indices.len(),
            rows.indices.len()
        );

        let w = intersection(matrix, &rows.indices, &columns.indices);
        let svd = TruncatedSvd::compute(&w, self.rank, self.energy)?;

        let reciprocal_sq = Array2::from_diag(&svd.s().mapv(|z| 1.0 / (z * z)));
        let core = svd.vt().t().dot(&reciprocal_sq).dot(&svd.u().t());

        let c = columns.matrix.to_dense();
        let r = rows.matrix.transpose().to_dense();
        let mut approximation = c.dot(&core).dot(&r);
        nan_to_zero(&mut approximation);
        Ok(approximation)
    }
}
