//! Partition
//!
//! Seeded row splits for the loops that produce calibration data: a single
//! training/calibration split, or a k-fold assignment where every fold serves
//! once as the calibration set.
use crate::data::Table;
use crate::errors::ConformalError;
use crate::utils::validate_error_rate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of a training/calibration split, each ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub training: Vec<usize>,
    pub calibration: Vec<usize>,
}

fn shuffled_indices(n_rows: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut index: Vec<usize> = (0..n_rows).collect();
    index.shuffle(&mut rng);
    index
}

/// Randomly hold out a share of the rows for calibration.
///
/// * `n_rows` - Number of rows to split.
/// * `calibration_fraction` - Share of rows held out, strictly between 0 and 1.
/// * `seed` - Seed of the shuffle, equal seeds give equal splits.
pub fn calibration_split(n_rows: usize, calibration_fraction: f64, seed: u64) -> Result<Split, ConformalError> {
    validate_error_rate(calibration_fraction, "calibration_fraction")?;
    let index = shuffled_indices(n_rows, seed);
    let n_calibration = ((n_rows as f64) * calibration_fraction).round() as usize;
    let (calibration, training) = index.split_at(n_calibration.min(n_rows));
    let mut calibration = calibration.to_vec();
    let mut training = training.to_vec();
    calibration.sort_unstable();
    training.sort_unstable();
    Ok(Split { training, calibration })
}

/// Assign every row to one of `k` folds of near equal size.
///
/// Returns the fold of each row.
pub fn fold_assignment(n_rows: usize, k: usize, seed: u64) -> Result<Vec<usize>, ConformalError> {
    if k < 2 {
        return Err(ConformalError::InvalidConfiguration(
            "k".to_string(),
            "at least 2 folds".to_string(),
            k.to_string(),
        ));
    }
    let mut folds = vec![0; n_rows];
    for (position, row) in shuffled_indices(n_rows, seed).into_iter().enumerate() {
        folds[row] = position % k;
    }
    Ok(folds)
}

/// The split where `fold` is the calibration set and the other folds train.
pub fn fold_split(folds: &[usize], fold: usize) -> Split {
    let (calibration, training): (Vec<usize>, Vec<usize>) = (0..folds.len()).partition(|i| folds[*i] == fold);
    Split { training, calibration }
}

/// A table holding the given rows, in the given order.
pub fn select_rows(table: &Table, indices: &[usize]) -> Table {
    Table {
        spec: table.spec.clone(),
        rows: indices.iter().filter_map(|i| table.rows.get(*i).cloned()).collect(),
    }
}
