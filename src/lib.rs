mod io;

// Modules
pub mod calibration;
pub mod config;
pub mod conformal;
pub mod data;
pub mod errors;
pub mod partition;
pub mod pipeline;
pub mod transform;
pub mod utils;

// Individual classes, and functions
pub use calibration::aggregator::CalibrationAggregator;
pub use calibration::store::CalibrationStore;
pub use config::{ClassificationConfig, KeepColumnsConfig, NormalizationConfig, RegressionConfig};
pub use data::{Cell, ColumnSpec, DataRow, Table, TableSpec};
pub use errors::ConformalError;
pub use io::JsonIO;
pub use transform::RowTransform;
