//! Transform
//!
//! Row transforms appending conformal outputs to prediction rows. The output
//! spec is fixed when a transform is created, and each row is a pure function
//! of the row and the read-only calibration, so rows can be streamed one at a
//! time or processed by any number of workers.
use crate::calibration::build::{check_all_classes_present, class_score_columns, PREDICTION_TABLE};
use crate::calibration::store::{ClassificationCalibration, RegressionCalibration};
use crate::config::{ClassificationConfig, KeepColumnsConfig, RegressionConfig};
use crate::conformal::pvalue::summarize;
use crate::data::{Cell, ColumnSpec, DataRow, Table, TableSpec};
use crate::errors::ConformalError;
use crate::utils::format_column_name;
use rayon::prelude::*;

pub const CLASSES_COLUMN: &str = "Classes";
pub const CREDIBILITY_COLUMN: &str = "Credibility";
pub const CONFIDENCE_COLUMN: &str = "Confidence";

/// A per-row transformation with a fixed output spec.
pub trait RowTransform: Sync {
    /// Spec of every row this transform emits.
    fn output_spec(&self) -> &TableSpec;

    /// Transform a single row. A failed row emits nothing.
    fn transform_row(&self, row: &DataRow) -> Result<DataRow, ConformalError>;

    /// Transform a partition, keeping row order.
    fn transform_partition(&self, rows: &[DataRow]) -> Result<Vec<DataRow>, ConformalError> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    /// Transform a partition on the rayon pool, keeping row order.
    ///
    /// When several rows fail, the error returned is the one of any failing
    /// row, not necessarily the first in row order.
    fn transform_partition_par(&self, rows: &[DataRow]) -> Result<Vec<DataRow>, ConformalError> {
        rows.par_iter().map(|row| self.transform_row(row)).collect()
    }

    /// Transform a whole table.
    /// * `parallel` - Spread the rows over the rayon pool.
    fn transform_table(&self, table: &Table, parallel: bool) -> Result<Table, ConformalError> {
        let rows = if parallel {
            self.transform_partition_par(&table.rows)?
        } else {
            self.transform_partition(&table.rows)?
        };
        Table::new(self.output_spec().clone(), rows)
    }

    /// Lazily transform a stream of rows. The stream ends after the first error.
    fn stream<I>(&self, rows: I) -> RowStream<'_, Self, I::IntoIter>
    where
        Self: Sized,
        I: IntoIterator<Item = DataRow>,
    {
        RowStream {
            transform: self,
            rows: rows.into_iter(),
            failed: false,
        }
    }
}

/// Iterator returned by `RowTransform::stream`.
pub struct RowStream<'a, T, I> {
    transform: &'a T,
    rows: I,
    failed: bool,
}

impl<'a, T, I> Iterator for RowStream<'a, T, I>
where
    T: RowTransform,
    I: Iterator<Item = DataRow>,
{
    type Item = Result<DataRow, ConformalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let row = self.rows.next()?;
        let result = self.transform.transform_row(&row);
        self.failed = result.is_err();
        Some(result)
    }
}

impl<'a, T, I> std::iter::FusedIterator for RowStream<'a, T, I>
where
    T: RowTransform,
    I: std::iter::FusedIterator<Item = DataRow>,
{
}

/// Output spec builder that refuses duplicate column names.
struct OutputSpecBuilder {
    spec: TableSpec,
}

impl OutputSpecBuilder {
    fn new(input: &TableSpec, keep_columns: &KeepColumnsConfig) -> Result<(Self, Vec<usize>), ConformalError> {
        keep_columns.validate()?;
        let retained = keep_columns.retained_indices(input)?;
        let spec = TableSpec::new(retained.iter().map(|i| input.columns()[*i].clone()).collect());
        Ok((OutputSpecBuilder { spec }, retained))
    }

    fn push(&mut self, column: ColumnSpec) -> Result<(), ConformalError> {
        if self.spec.contains_name(&column.name) {
            return Err(ConformalError::InvalidConfiguration(
                "output column".to_string(),
                "a name not used by a retained column".to_string(),
                format!("'{}'", column.name),
            ));
        }
        self.spec.push(column);
        Ok(())
    }
}

fn retained_cells(row: &DataRow, retained: &[usize], capacity: usize) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(capacity);
    cells.extend(retained.iter().map(|i| row.get(*i).cloned().unwrap_or(Cell::Missing)));
    cells
}

/// Appends a rank and a p-value column per class of the calibration domain,
/// and optionally the prediction set with its credibility and confidence.
#[derive(Debug)]
pub struct ClassificationTransform<'a> {
    calibration: &'a ClassificationCalibration,
    retained: Vec<usize>,
    score_indices: Vec<usize>,
    score_columns: Vec<String>,
    summary_error_rate: Option<f64>,
    output: TableSpec,
}

impl<'a> ClassificationTransform<'a> {
    /// Validate the prediction spec against the calibration and fix the output spec.
    ///
    /// * `calibration` - Finalized per-class calibration.
    /// * `prediction` - Spec of the rows to be transformed.
    /// * `config` - Classification configuration.
    pub fn new(
        calibration: &'a ClassificationCalibration,
        prediction: &TableSpec,
        config: &ClassificationConfig,
    ) -> Result<Self, ConformalError> {
        config.validate()?;
        let classes = calibration.classes();
        check_all_classes_present(classes, prediction, &config.class_column)?;
        let score_indices =
            class_score_columns(prediction, classes, &config.prediction_column_format, PREDICTION_TABLE)?;
        let score_columns = classes
            .iter()
            .map(|c| format_column_name(&config.prediction_column_format, c))
            .collect();

        let (mut builder, retained) = OutputSpecBuilder::new(prediction, &config.keep_columns)?;
        for class in classes {
            builder.push(ColumnSpec::integer(&format_column_name(&config.rank_column_format, class)))?;
            builder.push(ColumnSpec::numeric(&format_column_name(&config.score_column_format, class)))?;
        }
        if config.summary_error_rate.is_some() {
            builder.push(ColumnSpec::nominal(CLASSES_COLUMN, None))?;
            builder.push(ColumnSpec::numeric(CREDIBILITY_COLUMN))?;
            builder.push(ColumnSpec::numeric(CONFIDENCE_COLUMN))?;
        }

        Ok(ClassificationTransform {
            calibration,
            retained,
            score_indices,
            score_columns,
            summary_error_rate: config.summary_error_rate,
            output: builder.spec,
        })
    }
}

impl RowTransform for ClassificationTransform<'_> {
    fn output_spec(&self) -> &TableSpec {
        &self.output
    }

    fn transform_row(&self, row: &DataRow) -> Result<DataRow, ConformalError> {
        let scores = self
            .score_indices
            .iter()
            .zip(&self.score_columns)
            .map(|(idx, column)| row.numeric(*idx, column))
            .collect::<Result<Vec<_>, _>>()?;
        let class_scores = self.calibration.predict_row(&scores)?;

        let mut cells = retained_cells(row, &self.retained, self.output.len());
        for class_score in &class_scores {
            cells.push(Cell::Integer(class_score.rank as i64));
            cells.push(Cell::Numeric(class_score.p_value));
        }
        if let Some(error_rate) = self.summary_error_rate {
            let p_values: Vec<f64> = class_scores.iter().map(|s| s.p_value).collect();
            let summary = summarize(self.calibration.classes(), &p_values, error_rate);
            cells.push(Cell::Nominal(summary.classes.join(", ")));
            cells.push(Cell::Numeric(summary.credibility));
            cells.push(Cell::Numeric(summary.confidence));
        }
        Ok(DataRow {
            key: row.key.clone(),
            cells,
        })
    }
}

#[derive(Debug)]
struct SigmaColumn {
    idx: usize,
    name: String,
    beta: f64,
}

/// Appends the lower and upper bound of the conformal interval around the
/// point estimate of each row.
#[derive(Debug)]
pub struct RegressionTransform<'a> {
    calibration: &'a RegressionCalibration,
    retained: Vec<usize>,
    prediction_idx: usize,
    prediction_column: String,
    sigma: Option<SigmaColumn>,
    error_rate: f64,
    output: TableSpec,
}

impl<'a> RegressionTransform<'a> {
    pub fn new(
        calibration: &'a RegressionCalibration,
        prediction: &TableSpec,
        config: &RegressionConfig,
    ) -> Result<Self, ConformalError> {
        config.validate()?;
        let prediction_idx = prediction.numeric_column_index(&config.prediction_column, PREDICTION_TABLE)?;
        let sigma = match &config.normalization {
            Some(normalization) => Some(SigmaColumn {
                idx: prediction.numeric_column_index(&normalization.sigma_column, PREDICTION_TABLE)?,
                name: normalization.sigma_column.clone(),
                beta: normalization.beta,
            }),
            None => None,
        };

        let (mut builder, retained) = OutputSpecBuilder::new(prediction, &config.keep_columns)?;
        builder.push(ColumnSpec::numeric(&config.lower_bound_column))?;
        builder.push(ColumnSpec::numeric(&config.upper_bound_column))?;

        Ok(RegressionTransform {
            calibration,
            retained,
            prediction_idx,
            prediction_column: config.prediction_column.clone(),
            sigma,
            error_rate: config.error_rate,
            output: builder.spec,
        })
    }
}

impl RowTransform for RegressionTransform<'_> {
    fn output_spec(&self) -> &TableSpec {
        &self.output
    }

    fn transform_row(&self, row: &DataRow) -> Result<DataRow, ConformalError> {
        let point = row.numeric(self.prediction_idx, &self.prediction_column)?;
        let interval = match &self.sigma {
            Some(sigma) => {
                let difficulty = row.numeric(sigma.idx, &sigma.name)? + sigma.beta;
                if !difficulty.is_finite() || difficulty <= 0.0 {
                    return Err(ConformalError::InvalidValue {
                        column: sigma.name.clone(),
                        row: row.key.clone(),
                    });
                }
                self.calibration
                    .predict_normalized_interval(point, difficulty, self.error_rate)?
            }
            None => self.calibration.predict_interval(point, self.error_rate)?,
        };

        let mut cells = retained_cells(row, &self.retained, self.output.len());
        cells.push(Cell::Numeric(interval.lower));
        cells.push(Cell::Numeric(interval.upper));
        Ok(DataRow {
            key: row.key.clone(),
            cells,
        })
    }
}
