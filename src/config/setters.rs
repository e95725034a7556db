use crate::config::{ClassificationConfig, KeepColumnsConfig, NormalizationConfig, RegressionConfig};

impl ClassificationConfig {
    // Set methods for parameters

    /// Set the template naming the per-class score columns.
    /// * `format` - Template, `%s` is replaced by the class label.
    pub fn set_prediction_column_format(mut self, format: &str) -> Self {
        self.prediction_column_format = format.to_string();
        self
    }

    /// Set the single true-class score column of the calibration table.
    /// * `column` - Column name, `None` to read the per-class columns.
    pub fn set_calibration_score_column(mut self, column: Option<String>) -> Self {
        self.calibration_score_column = column;
        self
    }

    /// Set the template naming the output rank columns.
    pub fn set_rank_column_format(mut self, format: &str) -> Self {
        self.rank_column_format = format.to_string();
        self
    }

    /// Set the template naming the output p-value columns.
    pub fn set_score_column_format(mut self, format: &str) -> Self {
        self.score_column_format = format.to_string();
        self
    }

    /// Set the error rate of the appended prediction-set columns.
    /// * `error_rate` - `None` disables the summary columns.
    pub fn set_summary_error_rate(mut self, error_rate: Option<f64>) -> Self {
        self.summary_error_rate = error_rate;
        self
    }

    /// Set the column retention policy.
    pub fn set_keep_columns(mut self, keep_columns: KeepColumnsConfig) -> Self {
        self.keep_columns = keep_columns;
        self
    }
}

impl RegressionConfig {
    /// Set the error rate.
    /// * `error_rate` - Tolerated miscoverage, strictly between 0 and 1.
    pub fn set_error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate;
        self
    }

    /// Set the names of the output bound columns.
    pub fn set_bound_columns(mut self, lower: &str, upper: &str) -> Self {
        self.lower_bound_column = lower.to_string();
        self.upper_bound_column = upper.to_string();
        self
    }

    /// Set residual normalization.
    /// * `normalization` - `None` for plain absolute residuals.
    pub fn set_normalization(mut self, normalization: Option<NormalizationConfig>) -> Self {
        self.normalization = normalization;
        self
    }

    /// Set the column retention policy.
    pub fn set_keep_columns(mut self, keep_columns: KeepColumnsConfig) -> Self {
        self.keep_columns = keep_columns;
        self
    }
}

impl KeepColumnsConfig {
    /// Keep only the given id column.
    pub fn id_only(id_column: &str) -> Self {
        KeepColumnsConfig {
            keep_all_columns: false,
            keep_id_column: true,
            id_column: id_column.to_string(),
        }
    }

    /// Keep none of the input columns.
    pub fn none() -> Self {
        KeepColumnsConfig {
            keep_all_columns: false,
            keep_id_column: false,
            id_column: String::new(),
        }
    }
}
