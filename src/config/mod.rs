//! Configuration
//!
//! Immutable configuration values consumed by the calibration build and the
//! prediction transforms, with pure validation and JSON IO.
use crate::data::TableSpec;
use crate::errors::ConformalError;
use crate::io::JsonIO;
use crate::utils::{
    validate_error_rate, validate_non_empty, validate_non_negative_float_parameter, validate_template,
};
use serde::{Deserialize, Serialize};

mod setters;

pub const DEFAULT_ERROR_RATE: f64 = 0.05;
pub const DEFAULT_PREDICTION_COLUMN_FORMAT: &str = "P (%s)";
pub const DEFAULT_RANK_COLUMN_FORMAT: &str = "Rank (%s)";
pub const DEFAULT_SCORE_COLUMN_FORMAT: &str = "Score (%s)";
pub const DEFAULT_LOWER_BOUND_COLUMN: &str = "Lower bound";
pub const DEFAULT_UPPER_BOUND_COLUMN: &str = "Upper bound";

fn default_true() -> bool {
    true
}
fn default_error_rate() -> f64 {
    DEFAULT_ERROR_RATE
}
fn default_prediction_column_format() -> String {
    DEFAULT_PREDICTION_COLUMN_FORMAT.to_string()
}
fn default_rank_column_format() -> String {
    DEFAULT_RANK_COLUMN_FORMAT.to_string()
}
fn default_score_column_format() -> String {
    DEFAULT_SCORE_COLUMN_FORMAT.to_string()
}
fn default_lower_bound_column() -> String {
    DEFAULT_LOWER_BOUND_COLUMN.to_string()
}
fn default_upper_bound_column() -> String {
    DEFAULT_UPPER_BOUND_COLUMN.to_string()
}

/// Column retention policy for the prediction output.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct KeepColumnsConfig {
    /// Retain every column of the prediction table.
    #[serde(default = "default_true")]
    pub keep_all_columns: bool,
    /// Retain only the id column. Ignored when `keep_all_columns` is set.
    #[serde(default)]
    pub keep_id_column: bool,
    /// Name of the id column.
    #[serde(default)]
    pub id_column: String,
}

impl Default for KeepColumnsConfig {
    fn default() -> Self {
        KeepColumnsConfig {
            keep_all_columns: true,
            keep_id_column: false,
            id_column: String::new(),
        }
    }
}

impl KeepColumnsConfig {
    fn uses_id_column(&self) -> bool {
        !self.keep_all_columns && self.keep_id_column
    }

    /// Validates internal consistency: the id column is required only if
    /// keep-id is set and keep-all is not.
    pub fn validate(&self) -> Result<(), ConformalError> {
        if self.uses_id_column() {
            validate_non_empty(&self.id_column, "id_column")?;
        }
        Ok(())
    }

    /// Validates the settings against the prediction table spec.
    pub fn validate_against(&self, spec: &TableSpec) -> Result<(), ConformalError> {
        self.validate()?;
        self.retained_indices(spec).map(|_| ())
    }

    /// Indices of the input columns copied to the output, in input order.
    pub fn retained_indices(&self, spec: &TableSpec) -> Result<Vec<usize>, ConformalError> {
        if self.keep_all_columns {
            Ok((0..spec.len()).collect())
        } else if self.keep_id_column {
            Ok(vec![spec.column_index(&self.id_column, "prediction")?])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Where the calibration table carries the score of each row's true class.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub enum ScoreSource {
    /// One score column per class, named by the prediction column format.
    PerClass,
    /// A single column already holding the true-class score.
    Column(String),
}

/// Configuration for conformal classification.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ClassificationConfig {
    /// Nominal column holding the class label. Must declare a domain.
    pub class_column: String,
    /// Template naming the per-class score columns, `%s` is the class label.
    #[serde(default = "default_prediction_column_format")]
    pub prediction_column_format: String,
    /// Single true-class score column of the calibration table, if any.
    /// When unset the per-class columns are read instead.
    #[serde(default)]
    pub calibration_score_column: Option<String>,
    /// Template naming the output rank columns.
    #[serde(default = "default_rank_column_format")]
    pub rank_column_format: String,
    /// Template naming the output p-value columns.
    #[serde(default = "default_score_column_format")]
    pub score_column_format: String,
    /// When set, the prediction set, credibility and confidence columns are
    /// appended, with the set built at this error rate.
    #[serde(default)]
    pub summary_error_rate: Option<f64>,
    #[serde(default)]
    pub keep_columns: KeepColumnsConfig,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        ClassificationConfig {
            class_column: String::new(),
            prediction_column_format: default_prediction_column_format(),
            calibration_score_column: None,
            rank_column_format: default_rank_column_format(),
            score_column_format: default_score_column_format(),
            summary_error_rate: None,
            keep_columns: KeepColumnsConfig::default(),
        }
    }
}

impl ClassificationConfig {
    pub fn new(class_column: &str) -> Self {
        ClassificationConfig {
            class_column: class_column.to_string(),
            ..Default::default()
        }
    }

    pub fn score_source(&self) -> ScoreSource {
        match &self.calibration_score_column {
            Some(column) => ScoreSource::Column(column.clone()),
            None => ScoreSource::PerClass,
        }
    }

    pub fn validate(&self) -> Result<(), ConformalError> {
        validate_non_empty(&self.class_column, "class_column")?;
        validate_template(&self.prediction_column_format, "prediction_column_format")?;
        validate_template(&self.rank_column_format, "rank_column_format")?;
        validate_template(&self.score_column_format, "score_column_format")?;
        if self.rank_column_format == self.score_column_format {
            return Err(ConformalError::InvalidConfiguration(
                "score_column_format".to_string(),
                "a format different from rank_column_format".to_string(),
                format!("'{}'", self.score_column_format),
            ));
        }
        if let Some(column) = &self.calibration_score_column {
            validate_non_empty(column, "calibration_score_column")?;
        }
        if let Some(rate) = self.summary_error_rate {
            validate_error_rate(rate, "summary_error_rate")?;
        }
        self.keep_columns.validate()
    }
}

/// Normalization of regression residuals by a per-row difficulty estimate.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct NormalizationConfig {
    /// Numeric column holding the difficulty estimate, present in both tables.
    pub sigma_column: String,
    /// Smoothing added to every difficulty estimate.
    #[serde(default)]
    pub beta: f64,
}

impl NormalizationConfig {
    pub fn validate(&self) -> Result<(), ConformalError> {
        validate_non_empty(&self.sigma_column, "sigma_column")?;
        validate_non_negative_float_parameter(self.beta, "beta")
    }
}

/// Configuration for conformal regression.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct RegressionConfig {
    /// Numeric column with the true value, calibration table only.
    pub target_column: String,
    /// Numeric column with the point estimate, present in both tables.
    pub prediction_column: String,
    /// Target error rate, strictly between 0 and 1.
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,
    #[serde(default = "default_lower_bound_column")]
    pub lower_bound_column: String,
    #[serde(default = "default_upper_bound_column")]
    pub upper_bound_column: String,
    #[serde(default)]
    pub normalization: Option<NormalizationConfig>,
    #[serde(default)]
    pub keep_columns: KeepColumnsConfig,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        RegressionConfig {
            target_column: String::new(),
            prediction_column: String::new(),
            error_rate: DEFAULT_ERROR_RATE,
            lower_bound_column: default_lower_bound_column(),
            upper_bound_column: default_upper_bound_column(),
            normalization: None,
            keep_columns: KeepColumnsConfig::default(),
        }
    }
}

impl RegressionConfig {
    pub fn new(target_column: &str, prediction_column: &str) -> Self {
        RegressionConfig {
            target_column: target_column.to_string(),
            prediction_column: prediction_column.to_string(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConformalError> {
        validate_non_empty(&self.target_column, "target_column")?;
        validate_non_empty(&self.prediction_column, "prediction_column")?;
        validate_error_rate(self.error_rate, "error_rate")?;
        validate_non_empty(&self.lower_bound_column, "lower_bound_column")?;
        validate_non_empty(&self.upper_bound_column, "upper_bound_column")?;
        if self.lower_bound_column == self.upper_bound_column {
            return Err(ConformalError::InvalidConfiguration(
                "upper_bound_column".to_string(),
                "a name different from lower_bound_column".to_string(),
                format!("'{}'", self.upper_bound_column),
            ));
        }
        if let Some(normalization) = &self.normalization {
            normalization.validate()?;
        }
        self.keep_columns.validate()
    }
}

impl JsonIO for ClassificationConfig {}
impl JsonIO for RegressionConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnSpec;
    use tempfile::tempdir;

    #[test]
    fn test_classification_config_default() {
        let config = ClassificationConfig::new("class");
        assert_eq!(config.rank_column_format, "Rank (%s)");
        assert_eq!(config.score_column_format, "Score (%s)");
        assert_eq!(config.score_source(), ScoreSource::PerClass);
        assert!(config.keep_columns.keep_all_columns);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_classification_config_invalid() {
        assert!(ClassificationConfig::default().validate().is_err());
        let config = ClassificationConfig::new("class").set_rank_column_format("Rank");
        assert!(config.validate().is_err());
        let config = ClassificationConfig::new("class").set_score_column_format("Rank (%s)");
        assert!(config.validate().is_err());
        let config = ClassificationConfig::new("class").set_summary_error_rate(Some(1.5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_regression_config_error_rate_bounds() {
        let config = RegressionConfig::new("y", "prediction");
        assert_eq!(config.error_rate, 0.05);
        assert!(config.validate().is_ok());
        for rate in [0.0, 1.0, -0.1, f64::NAN] {
            let config = RegressionConfig::new("y", "prediction").set_error_rate(rate);
            assert!(matches!(
                config.validate(),
                Err(ConformalError::InvalidConfiguration(..))
            ));
        }
        assert!(RegressionConfig::new("y", "").validate().is_err());
    }

    #[test]
    fn test_regression_config_normalization() {
        let config = RegressionConfig::new("y", "prediction").set_normalization(Some(NormalizationConfig {
            sigma_column: "sigma".to_string(),
            beta: -1.0,
        }));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keep_columns_cross_field() {
        let keep = KeepColumnsConfig {
            keep_all_columns: false,
            keep_id_column: true,
            id_column: String::new(),
        };
        assert!(keep.validate().is_err());

        // Id column is only required when keep-all is off.
        let keep = KeepColumnsConfig {
            keep_all_columns: true,
            keep_id_column: true,
            id_column: String::new(),
        };
        assert!(keep.validate().is_ok());
    }

    #[test]
    fn test_keep_columns_retained_indices() {
        let spec = TableSpec::new(vec![ColumnSpec::nominal("id", None), ColumnSpec::numeric("x")]);
        assert_eq!(KeepColumnsConfig::default().retained_indices(&spec).unwrap(), vec![0, 1]);

        let keep = KeepColumnsConfig {
            keep_all_columns: false,
            keep_id_column: true,
            id_column: "x".to_string(),
        };
        assert_eq!(keep.retained_indices(&spec).unwrap(), vec![1]);

        let keep = KeepColumnsConfig {
            keep_all_columns: false,
            keep_id_column: false,
            id_column: String::new(),
        };
        assert!(keep.retained_indices(&spec).unwrap().is_empty());

        let keep = KeepColumnsConfig {
            keep_all_columns: false,
            keep_id_column: true,
            id_column: "key".to_string(),
        };
        assert!(matches!(
            keep.validate_against(&spec),
            Err(ConformalError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_config_io_json() {
        let config = ClassificationConfig::new("class").set_calibration_score_column(Some("Score".to_string()));
        let json = config.json_dump().unwrap();
        let config2 = ClassificationConfig::from_json(&json).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_config_io_defaults_from_partial_json() {
        let json = r#"{"target_column": "y", "prediction_column": "pred"}"#;
        let config = RegressionConfig::from_json(json).unwrap();
        assert_eq!(config.error_rate, DEFAULT_ERROR_RATE);
        assert_eq!(config.lower_bound_column, "Lower bound");
        assert!(config.keep_columns.keep_all_columns);
    }

    #[test]
    fn test_config_io_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("regression.json");
        let config = RegressionConfig::new("y", "prediction").set_error_rate(0.2);
        config.save(&file_path).unwrap();
        let config2 = RegressionConfig::load(&file_path).unwrap();
        assert_eq!(config2.error_rate, 0.2);
        assert!(RegressionConfig::load(dir.path().join("missing.json")).is_err());
    }
}
