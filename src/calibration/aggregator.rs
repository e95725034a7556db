//! Calibration Aggregator
//!
//! Collects the partial calibrations produced by the iterations of a loop
//! (one per cross-validation fold, for example) and merges them into a single
//! store once the loop terminates.
use crate::calibration::store::CalibrationStore;
use crate::errors::ConformalError;
use log::{debug, info};

/// Accumulates partial calibration stores, one per loop iteration.
///
/// Merging keeps every score of every partial, so the result does not depend
/// on the order the partials are added in.
#[derive(Debug, Clone, Default)]
pub struct CalibrationAggregator {
    merged: Option<CalibrationStore>,
    iterations: usize,
    n_scores: usize,
}

impl CalibrationAggregator {
    pub fn new() -> Self {
        CalibrationAggregator::default()
    }

    /// Add the calibration of one iteration.
    ///
    /// Fails with `CalibrationKindMismatch` when the partial is not of the
    /// same kind as the ones added before. The aggregator is left unchanged
    /// in that case.
    pub fn add(&mut self, partial: &CalibrationStore) -> Result<(), ConformalError> {
        let merged = match &self.merged {
            Some(store) => store.merge(partial)?,
            None => partial.clone(),
        };
        debug!(
            "iteration {}, kind: {}, scores: {}",
            self.iterations,
            partial.kind(),
            partial.len()
        );
        self.n_scores += partial.len();
        self.iterations += 1;
        self.merged = Some(merged);
        Ok(())
    }

    /// Number of partials added so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of calibration scores collected so far.
    pub fn n_scores(&self) -> usize {
        self.n_scores
    }

    /// Finish the loop and hand out the combined store.
    ///
    /// With no partials added the result is `CalibrationStore::Empty`, which
    /// refuses to produce p-values or intervals.
    pub fn finish(self) -> CalibrationStore {
        info!(
            "Aggregated {} calibration scores from {} iterations.",
            self.n_scores, self.iterations
        );
        self.merged.unwrap_or(CalibrationStore::Empty)
    }
}

/// Merge partial calibration stores into one.
///
/// * `partials` - Partial stores of the same kind, in any order.
pub fn merge(partials: &[CalibrationStore]) -> Result<CalibrationStore, ConformalError> {
    let mut aggregator = CalibrationAggregator::new();
    for partial in partials {
        aggregator.add(partial)?;
    }
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::record::NonconformityRecord;
    use crate::calibration::store::{ClassificationCalibration, RegressionCalibration};

    fn regression(residuals: &[f64]) -> CalibrationStore {
        RegressionCalibration::from_residuals(residuals.to_vec()).unwrap().into()
    }

    #[test]
    fn test_merge_regression_folds() {
        let merged = merge(&[regression(&[1.0, 3.0]), regression(&[2.0, 4.0])]).unwrap();
        assert_eq!(merged.as_regression().unwrap().residuals(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_merge_nothing_is_unusable() {
        let merged = merge(&[]).unwrap();
        assert_eq!(merged, CalibrationStore::Empty);
        assert!(matches!(
            merged.as_classification(),
            Err(ConformalError::InsufficientCalibration(_))
        ));
    }

    #[test]
    fn test_aggregator_counts_iterations() {
        let mut aggregator = CalibrationAggregator::new();
        aggregator.add(&regression(&[0.5])).unwrap();
        aggregator.add(&regression(&[])).unwrap();
        aggregator.add(&regression(&[0.1, 0.2])).unwrap();
        assert_eq!(aggregator.iterations(), 3);
        assert_eq!(aggregator.n_scores(), 3);
        assert_eq!(aggregator.finish().as_regression().unwrap().residuals(), &[0.1, 0.2, 0.5]);
    }

    #[test]
    fn test_aggregator_rejects_mixed_kinds() {
        let classes = vec!["A".to_string(), "B".to_string()];
        let classification: CalibrationStore = ClassificationCalibration::from_records(
            &classes,
            &[NonconformityRecord::classification("A", 0.4)],
        )
        .unwrap()
        .into();
        let mut aggregator = CalibrationAggregator::new();
        aggregator.add(&classification).unwrap();
        assert!(matches!(
            aggregator.add(&regression(&[1.0])),
            Err(ConformalError::CalibrationKindMismatch(..))
        ));
        assert_eq!(aggregator.iterations(), 1);
        assert_eq!(aggregator.finish(), classification);
    }
}
