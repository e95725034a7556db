//! Pipeline
//!
//! One-shot drivers from tables to predictions. Every schema, domain and
//! configuration check runs before the first prediction row is transformed.
use crate::calibration::aggregator::CalibrationAggregator;
use crate::calibration::build::{build_classification, build_regression, validate_classification, validate_regression};
use crate::calibration::store::CalibrationStore;
use crate::config::{ClassificationConfig, RegressionConfig};
use crate::data::Table;
use crate::errors::ConformalError;
use crate::transform::{ClassificationTransform, RegressionTransform, RowTransform};
use log::info;

/// Calibrate on `calibration` and predict the rows of `prediction`.
///
/// * `calibration` - Labeled rows with per-class scores, or a true-class score column.
/// * `prediction` - Rows with per-class scores.
/// * `config` - Classification configuration.
/// * `parallel` - Transform the prediction rows on the rayon pool.
pub fn predict_classification(
    calibration: &Table,
    prediction: &Table,
    config: &ClassificationConfig,
    parallel: bool,
) -> Result<Table, ConformalError> {
    validate_classification(&calibration.spec, &prediction.spec, config)?;
    let store = CalibrationStore::from(build_classification(calibration, config)?);
    predict_classification_with(&store, prediction, config, parallel)
}

/// Predict the rows of `prediction` against a finalized store, such as the
/// result of aggregating the folds of a loop.
pub fn predict_classification_with(
    store: &CalibrationStore,
    prediction: &Table,
    config: &ClassificationConfig,
    parallel: bool,
) -> Result<Table, ConformalError> {
    let transform = ClassificationTransform::new(store.as_classification()?, &prediction.spec, config)?;
    let output = transform.transform_table(prediction, parallel)?;
    info!("Predicted {} rows with {} columns.", output.len(), output.spec.len());
    Ok(output)
}

/// Calibrate residuals on `calibration` and predict intervals for `prediction`.
pub fn predict_regression(
    calibration: &Table,
    prediction: &Table,
    config: &RegressionConfig,
    parallel: bool,
) -> Result<Table, ConformalError> {
    validate_regression(&calibration.spec, &prediction.spec, config)?;
    let store = CalibrationStore::from(build_regression(calibration, config)?);
    predict_regression_with(&store, prediction, config, parallel)
}

pub fn predict_regression_with(
    store: &CalibrationStore,
    prediction: &Table,
    config: &RegressionConfig,
    parallel: bool,
) -> Result<Table, ConformalError> {
    let transform = RegressionTransform::new(store.as_regression()?, &prediction.spec, config)?;
    let output = transform.transform_table(prediction, parallel)?;
    info!("Predicted {} intervals.", output.len());
    Ok(output)
}

/// Build one partial store per calibration table and merge them.
///
/// * `partials` - Calibration table of every loop iteration.
pub fn aggregate_classification(
    partials: &[Table],
    config: &ClassificationConfig,
) -> Result<CalibrationStore, ConformalError> {
    let mut aggregator = CalibrationAggregator::new();
    for table in partials {
        aggregator.add(&CalibrationStore::from(build_classification(table, config)?))?;
    }
    Ok(aggregator.finish())
}

pub fn aggregate_regression(partials: &[Table], config: &RegressionConfig) -> Result<CalibrationStore, ConformalError> {
    let mut aggregator = CalibrationAggregator::new();
    for table in partials {
        aggregator.add(&CalibrationStore::from(build_regression(table, config)?))?;
    }
    Ok(aggregator.finish())
}
