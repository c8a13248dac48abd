//! Scoring of dense prediction matrices against held-out ratings.

use std::fmt;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use csv::{ReaderBuilder, StringRecord};
use nalgebra_sparse::CsrMatrix;
use ndarray::Array2;

/// RMSE and the rank-correlation statistic for one evaluation run.
///
/// `spearman` uses the shortcut formula `1 - 6·Σd²/(n·(n²-1))` applied to
/// raw rating differences rather than rank differences, so it is an
/// approximation of Spearman's ρ, kept for compatibility with the original
/// scoring.
pub struct Scores {
    pub rmse: f64,
    pub spearman: f64,
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMSE Error : {}\t Spearman Correlation : {}%",
            self.rmse,
            self.spearman * 100.0
        )
    }
}

/// Reads an ordered test-index list from a headerless CSV file.
///
/// Each record is `row,col` with 1-based indices; any further fields on the
/// record are ignored. Indices are converted to 0-based. A malformed record
/// is a fatal input error.
pub fn read_test_entries<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<(usize, usize)>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open test index file {}", path.display()))?;

    let mut entries = Vec::new();
    for result in reader.records() {
        let record =
            result.with_context(|| format!("failed to read record from {}", path.display()))?;
        let line = record.position().map_or(0, |p| p.line());
        let row = parse_index(record.get(0), &record, line)?;
        let col = parse_index(record.get(1), &record, line)?;
        entries.push((row, col));
    }
    Ok(entries)
}

fn parse_index(field: Option<&str>, record: &StringRecord, line: u64) -> anyhow::Result<usize> {
    let raw =
        field.ok_or_else(|| anyhow!("line {}: expected `row,col`, got {:?}", line, record))?;
    let value: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("line {}: invalid index {:?}", line, raw))?;
    if value == 0 {
        bail!("line {}: indices are 1-based, got 0", line);
    }
    Ok(value - 1)
}

/// Scores `predicted` against `ground_truth` at the listed test entries.
///
/// NaN predictions count as 0. `rmse = sqrt(Σd²/n)`. With a single test
/// entry the rank-correlation formula is undefined and 0 is reported.
pub fn score(
    predicted: &Array2<f64>,
    ground_truth: &CsrMatrix<f64>,
    test_entries: &[(usize, usize)],
) -> anyhow::Result<Scores> {
    if test_entries.is_empty() {
        bail!("cannot score an empty test set");
    }

    let mut total = 0.0;
    for &(r, c) in test_entries {
        if r >= predicted.nrows() || c >= predicted.ncols() {
            bail!(
                "test entry ({}, {}) lies outside the {}x{} prediction matrix",
                r,
                c,
                predicted.nrows(),
                predicted.ncols()
            );
        }
        let truth = ground_truth
            .get_entry(r, c)
            .ok_or_else(|| {
                anyhow!(
                    "test entry ({}, {}) lies outside the {}x{} rating matrix",
                    r,
                    c,
                    ground_truth.nrows(),
                    ground_truth.ncols()
                )
            })?
            .into_value();
        let value = predicted[[r, c]];
        let value = if value.is_nan() { 0.0 } else { value };
        let diff = truth - value;
        total += diff * diff;
    }

    let n = test_entries.len() as f64;
    let rmse = (total / n).sqrt();
    let spearman = if test_entries.len() > 1 {
        1.0 - 6.0 * total / (n * (n * n - 1.0))
    } else {
        0.0
    };
    Ok(Scores { rmse, spearman })
}
