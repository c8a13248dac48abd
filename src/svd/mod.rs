//! Energy-truncated singular value decomposition for sparse matrices.
//!
//! Computes the `rank` largest singular triples of a sparse matrix with the
//! Lanczos solver and keeps only the smallest trailing subset of singular
//! values whose cumulative squared magnitude reaches the requested energy
//! fraction.

use anyhow::{anyhow, bail};
use nalgebra_sparse::CsrMatrix;
use ndarray::{s, Array1, Array2, Axis};
use single_svdlib::legacy::svdLAS2;

const LANCZOS_SEED: u32 = 42;

pub struct TruncatedSvd {
    u: Array2<f64>,
    s: Array1<f64>,
    vt: Array2<f64>,
}

impl TruncatedSvd {
    /// Decomposes `matrix` at rank ≤ `rank`, retaining the minimal trailing
    /// singular-value suffix covering the `energy` fraction of the total
    /// squared singular-value mass. At least one singular value is always
    /// retained; `energy = 1` keeps the full decomposition.
    ///
    /// `rank` must be strictly smaller than `min(nrows, ncols)`.
    pub fn compute(matrix: &CsrMatrix<f64>, rank: usize, energy: f64) -> anyhow::Result<Self> {
        let min_dim = matrix.nrows().min(matrix.ncols());
        if rank == 0 || rank >= min_dim {
            bail!(
                "requested rank {} must lie in 1..min(nrows, ncols) = {}",
                rank,
                min_dim
            );
        }
        if !(energy > 0.0 && energy <= 1.0) {
            bail!("energy must lie in (0, 1], got {}", energy);
        }

        let iterations = matrix.nrows().max(matrix.ncols());
        let svd = svdLAS2(
            matrix,
            rank,
            iterations,
            &[-1.0e-30, 1.0e-30],
            1.0e-6,
            LANCZOS_SEED,
        )
        .map_err(|e| anyhow!("SVD computation failed: {}", e))?;

        // Singular values are kept in ascending order so the energy cut is a
        // trailing suffix ending at the largest value.
        let mut order: Vec<usize> = (0..svd.s.len()).collect();
        order.sort_by(|&a, &b| {
            svd.s[a]
                .partial_cmp(&svd.s[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let u = svd.ut.t().select(Axis(1), &order);
        let sv = Array1::from_iter(order.iter().map(|&i| svd.s[i]));
        let vt = svd.vt.select(Axis(0), &order);

        let cut = energy_cutoff(&sv, energy);
        Ok(TruncatedSvd {
            u: u.slice(s![.., cut..]).to_owned(),
            s: sv.slice(s![cut..]).to_owned(),
            vt: vt.slice(s![cut.., ..]).to_owned(),
        })
    }

    /// Left singular vectors, one column per retained singular value.
    pub fn u(&self) -> &Array2<f64> {
        &self.u
    }

    /// Retained singular values, ascending.
    pub fn s(&self) -> &Array1<f64> {
        &self.s
    }

    /// Right singular vectors, one row per retained singular value.
    pub fn vt(&self) -> &Array2<f64> {
        &self.vt
    }

    /// Dense low-rank approximation `U · diag(s) · Vt`.
    pub fn reconstruct(&self) -> Array2<f64> {
        let s_diag = Array2::from_diag(&self.s);
        self.u.dot(&s_diag).dot(&self.vt)
    }
}

/// Index of the first retained singular value: the largest cut such that the
/// squared sum of the remaining suffix still reaches `energy` times the total
/// squared mass. Never cuts everything away.
fn energy_cutoff(values: &Array1<f64>, energy: f64) -> usize {
    let total: f64 = values.iter().map(|v| v * v).sum();
    let threshold = energy * total;
    let mut suffix = total;
    for (i, v) in values.iter().enumerate() {
        if suffix < threshold {
            return i - 1;
        }
        suffix -= v * v;
    }
    // Even the largest value alone satisfies the threshold.
    values.len().saturating_sub(1)
}
