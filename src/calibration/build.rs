//! Calibration Build
//!
//! Schema and domain validation of the calibration and prediction tables,
//! and construction of calibration stores from calibration rows.
use crate::calibration::record::NonconformityRecord;
use crate::calibration::store::{ClassificationCalibration, RegressionCalibration};
use crate::config::{ClassificationConfig, RegressionConfig, ScoreSource};
use crate::data::{DataRow, Table, TableSpec};
use crate::errors::ConformalError;
use crate::utils::format_column_name;
use hashbrown::HashSet;
use log::{info, warn};

pub const CALIBRATION_TABLE: &str = "calibration";
pub const PREDICTION_TABLE: &str = "prediction";

/// Where the true-class score of a calibration row is read from.
enum ScoreColumns {
    Single(usize),
    /// Column index per class, aligned with the class domain.
    PerClass(Vec<usize>),
}

/// Resolved calibration-table layout for classification.
struct ClassificationLayout {
    class_idx: usize,
    classes: Vec<String>,
    scores: ScoreColumns,
}

/// The class domain declared by the calibration table.
///
/// Fails with `MissingColumn` when the class column is absent and with
/// `InsufficientDomain` when it declares no values.
pub fn calibration_classes(calibration: &TableSpec, class_column: &str) -> Result<Vec<String>, ConformalError> {
    let idx = calibration.column_index(class_column, CALIBRATION_TABLE)?;
    calibration.columns()[idx]
        .domain_values()
        .map(<[String]>::to_vec)
        .ok_or_else(|| ConformalError::InsufficientDomain(class_column.to_string()))
}

/// Every class the prediction table declares must be known to the calibration.
///
/// A prediction table without the class column, or without a declared domain
/// for it, declares no classes and passes.
pub fn check_all_classes_present(
    calibration_classes: &[String],
    prediction: &TableSpec,
    class_column: &str,
) -> Result<(), ConformalError> {
    let Some(prediction_classes) = prediction.column_spec(class_column).and_then(|c| c.domain_values()) else {
        return Ok(());
    };
    let known: HashSet<&str> = calibration_classes.iter().map(String::as_str).collect();
    match prediction_classes.iter().find(|c| !known.contains(c.as_str())) {
        Some(missing) => Err(ConformalError::UnseenClass(missing.clone())),
        None => Ok(()),
    }
}

/// Numeric per-class score columns of `table`, aligned with `classes`.
pub fn class_score_columns(
    spec: &TableSpec,
    classes: &[String],
    format: &str,
    table: &str,
) -> Result<Vec<usize>, ConformalError> {
    classes
        .iter()
        .map(|c| spec.numeric_column_index(&format_column_name(format, c), table))
        .collect()
}

fn classification_layout(
    calibration: &TableSpec,
    config: &ClassificationConfig,
) -> Result<ClassificationLayout, ConformalError> {
    let class_idx = calibration.column_index(&config.class_column, CALIBRATION_TABLE)?;
    let classes = calibration_classes(calibration, &config.class_column)?;
    let scores = match config.score_source() {
        ScoreSource::Column(name) => ScoreColumns::Single(calibration.numeric_column_index(&name, CALIBRATION_TABLE)?),
        ScoreSource::PerClass => ScoreColumns::PerClass(class_score_columns(
            calibration,
            &classes,
            &config.prediction_column_format,
            CALIBRATION_TABLE,
        )?),
    };
    Ok(ClassificationLayout {
        class_idx,
        classes,
        scores,
    })
}

/// Validate both table specs for classification before any row is read.
///
/// Returns the calibration class domain.
pub fn validate_classification(
    calibration: &TableSpec,
    prediction: &TableSpec,
    config: &ClassificationConfig,
) -> Result<Vec<String>, ConformalError> {
    config.validate()?;
    let layout = classification_layout(calibration, config)?;
    check_all_classes_present(&layout.classes, prediction, &config.class_column)?;
    class_score_columns(
        prediction,
        &layout.classes,
        &config.prediction_column_format,
        PREDICTION_TABLE,
    )?;
    config.keep_columns.validate_against(prediction)?;
    Ok(layout.classes)
}

fn classification_record(
    row: &DataRow,
    layout: &ClassificationLayout,
    config: &ClassificationConfig,
) -> Result<NonconformityRecord, ConformalError> {
    let label = row.nominal(layout.class_idx, &config.class_column)?;
    let score = match &layout.scores {
        ScoreColumns::Single(idx) => row.numeric(*idx, config.calibration_score_column.as_deref().unwrap_or_default())?,
        ScoreColumns::PerClass(indices) => {
            let pos = layout
                .classes
                .iter()
                .position(|c| c == label)
                .ok_or_else(|| ConformalError::UnseenClass(label.to_string()))?;
            let column = format_column_name(&config.prediction_column_format, label);
            row.numeric(indices[pos], &column)?
        }
    };
    Ok(NonconformityRecord::classification(label, score))
}

/// Build the per-class calibration from a calibration table.
///
/// For every row the score assigned to the row's true class is appended to
/// that class's set.
pub fn build_classification(
    calibration: &Table,
    config: &ClassificationConfig,
) -> Result<ClassificationCalibration, ConformalError> {
    config.validate()?;
    let layout = classification_layout(&calibration.spec, config)?;
    let records = calibration
        .rows
        .iter()
        .map(|row| classification_record(row, &layout, config))
        .collect::<Result<Vec<_>, _>>()?;
    let store = ClassificationCalibration::from_records(&layout.classes, &records)?;
    info!(
        "Built classification calibration from {} rows over {} classes.",
        records.len(),
        store.classes().len()
    );
    for set in store.class_sets().filter(|s| s.is_empty()) {
        warn!(
            "Class '{}' has no calibration examples, predictions will fail for it.",
            set.class_label()
        );
    }
    Ok(store)
}

/// Resolved calibration-table layout for regression.
struct RegressionLayout {
    target_idx: usize,
    prediction_idx: usize,
    sigma_idx: Option<usize>,
}

fn regression_layout(calibration: &TableSpec, config: &RegressionConfig) -> Result<RegressionLayout, ConformalError> {
    let target_idx = calibration.numeric_column_index(&config.target_column, CALIBRATION_TABLE)?;
    let prediction_idx = calibration.numeric_column_index(&config.prediction_column, CALIBRATION_TABLE)?;
    let sigma_idx = config
        .normalization
        .as_ref()
        .map(|n| calibration.numeric_column_index(&n.sigma_column, CALIBRATION_TABLE))
        .transpose()?;
    Ok(RegressionLayout {
        target_idx,
        prediction_idx,
        sigma_idx,
    })
}

/// Validate both table specs for regression before any row is read.
pub fn validate_regression(
    calibration: &TableSpec,
    prediction: &TableSpec,
    config: &RegressionConfig,
) -> Result<(), ConformalError> {
    config.validate()?;
    regression_layout(calibration, config)?;
    prediction.numeric_column_index(&config.prediction_column, PREDICTION_TABLE)?;
    if let Some(normalization) = &config.normalization {
        prediction.numeric_column_index(&normalization.sigma_column, PREDICTION_TABLE)?;
    }
    config.keep_columns.validate_against(prediction)
}

fn regression_record(
    row: &DataRow,
    layout: &RegressionLayout,
    config: &RegressionConfig,
) -> Result<NonconformityRecord, ConformalError> {
    let actual = row.numeric(layout.target_idx, &config.target_column)?;
    let predicted = row.numeric(layout.prediction_idx, &config.prediction_column)?;
    match (layout.sigma_idx, &config.normalization) {
        (Some(idx), Some(normalization)) => {
            let sigma = row.numeric(idx, &normalization.sigma_column)?;
            NonconformityRecord::normalized_regression(actual, predicted, sigma + normalization.beta).map_err(|_| {
                ConformalError::InvalidValue {
                    column: normalization.sigma_column.clone(),
                    row: row.key.clone(),
                }
            })
        }
        _ => Ok(NonconformityRecord::regression(actual, predicted)),
    }
}

/// Build the global residual calibration from a calibration table.
pub fn build_regression(
    calibration: &Table,
    config: &RegressionConfig,
) -> Result<RegressionCalibration, ConformalError> {
    config.validate()?;
    let layout = regression_layout(&calibration.spec, config)?;
    let records = calibration
        .rows
        .iter()
        .map(|row| regression_record(row, &layout, config))
        .collect::<Result<Vec<_>, _>>()?;
    let store = RegressionCalibration::from_records(&records)?;
    info!("Built regression calibration from {} rows.", store.len());
    Ok(store)
}
