//! Conformal Prediction
//!
//! Measures prediction-row scores against a finalized calibration: ranks and
//! p-values per class for classification, symmetric intervals for regression.

pub mod interval;
pub mod pvalue;
