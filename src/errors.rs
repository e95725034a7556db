//! Errors
//!
//! Custom error types used throughout the `conformal` crate.
use thiserror::Error;

/// Errors that can occur while calibrating or predicting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConformalError {
    /// A configured column does not exist in the table it was looked up in.
    #[error("Column '{column}' is missing from the {table} table.")]
    MissingColumn { column: String, table: String },
    /// The class column has no enumerated domain, so the full class set is unknown.
    #[error("Insufficient domain information for class column '{0}'.")]
    InsufficientDomain(String),
    /// A class of the prediction domain is not part of the calibration domain.
    #[error("Class '{0}' is missing in the calibration table.")]
    UnseenClass(String),
    /// No calibration scores are available where a p-value or interval was requested.
    #[error("No calibration examples available for {0}.")]
    InsufficientCalibration(String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidConfiguration(String, String, String),
    /// A column has an incompatible data type.
    #[error("Column '{column}' must be {expected}.")]
    InvalidColumnType { column: String, expected: String },
    /// A cell holds a missing or unusable value.
    #[error("Column '{column}' holds a missing or invalid value in row '{row}'.")]
    InvalidValue { column: String, row: String },
    /// Classification and regression calibration data were combined.
    #[error("Cannot combine {0} calibration data with {1} calibration data.")]
    CalibrationKindMismatch(String, String),
    /// Unable to write to file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read from file.
    #[error("Unable to read from a file {0}")]
    UnableToRead(String),
}
