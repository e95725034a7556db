//! Conformal Classification
//! ========================
//! Split a labeled table into calibration folds, aggregate the fold
//! calibrations and attach ranks, p-values and prediction sets to new rows.
//!
//! ```bash
//! cargo run --release --example conformal_classification
//! ```

use conformal::calibration::aggregator::CalibrationAggregator;
use conformal::calibration::build::build_classification;
use conformal::partition::{fold_assignment, fold_split, select_rows};
use conformal::pipeline::predict_classification_with;
use conformal::{
    CalibrationStore, Cell, ClassificationConfig, ColumnSpec, DataRow, JsonIO, KeepColumnsConfig, Table, TableSpec,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;

const CLASSES: [&str; 3] = ["setosa", "versicolor", "virginica"];

/// Scores of a noisy model that favors the true class.
fn synthetic_table(n_rows: usize, seed: u64) -> Result<Table, Box<dyn Error>> {
    let domain: Vec<String> = CLASSES.iter().map(|c| c.to_string()).collect();
    let mut columns = vec![ColumnSpec::nominal("id", None), ColumnSpec::nominal("class", Some(domain))];
    columns.extend(CLASSES.iter().map(|c| ColumnSpec::numeric(&format!("P ({})", c))));

    let mut rng = StdRng::seed_from_u64(seed);
    let rows = (0..n_rows)
        .map(|i| {
            let label = rng.gen_range(0..CLASSES.len());
            let mut cells = vec![Cell::from(format!("id{}", i).as_str()), Cell::from(CLASSES[label])];
            // Nonconformity: low for the true class, high otherwise.
            cells.extend((0..CLASSES.len()).map(|c| {
                let shift = if c == label { 0.0 } else { 0.5 };
                Cell::from(shift + rng.gen::<f64>() * 0.6)
            }));
            DataRow::new(&format!("Row{}", i), cells)
        })
        .collect();
    Ok(Table::new(TableSpec::new(columns), rows)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    // ------------------------------------------------------------------
    // 1. Calibrate on five folds and aggregate at loop end
    // ------------------------------------------------------------------
    let labeled = synthetic_table(1000, 42)?;
    let config = ClassificationConfig::new("class")
        .set_summary_error_rate(Some(0.1))
        .set_keep_columns(KeepColumnsConfig::id_only("id"));

    let folds = fold_assignment(labeled.len(), 5, 42)?;
    let mut aggregator = CalibrationAggregator::new();
    for fold in 0..5 {
        let split = fold_split(&folds, fold);
        let calibration = build_classification(&select_rows(&labeled, &split.calibration), &config)?;
        aggregator.add(&CalibrationStore::from(calibration))?;
    }
    let store = aggregator.finish();
    println!("Calibration store holds {} scores.", store.len());
    println!("Configuration: {}", config.json_dump()?);

    // ------------------------------------------------------------------
    // 2. Predict new rows
    // ------------------------------------------------------------------
    let new_rows = synthetic_table(5, 7)?;
    let output = predict_classification_with(&store, &new_rows, &config, true)?;
    println!("{}", output.spec.column_names().join(" | "));
    for row in &output.rows {
        let cells: Vec<String> = row.cells.iter().map(|c| c.to_string()).collect();
        println!("{}", cells.join(" | "));
    }
    Ok(())
}
