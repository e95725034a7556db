//! Calibration Module
//!
//! Builds and combines the empirical nonconformity distributions that
//! conformal predictions are measured against.
//!
//! # Submodules
//!
//! * `record`: A single calibration example's nonconformity score.
//! * `store`: Sorted per-class (classification) or global (regression) score sets.
//! * `build`: Table validation and store construction from calibration rows.
//! * `aggregator`: Merging of partial stores produced across loop iterations.

pub mod aggregator;
pub mod build;
pub mod record;
pub mod store;
