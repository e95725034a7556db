use conformal::calibration::record::NonconformityRecord;
use conformal::calibration::store::{ClassificationCalibration, RegressionCalibration};
use conformal::config::{ClassificationConfig, KeepColumnsConfig};
use conformal::transform::{ClassificationTransform, RowTransform};
use conformal::{Cell, ColumnSpec, DataRow, TableSpec};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const N_CALIBRATION: usize = 1_000_000;
const N_PREDICTION: usize = 100_000;

pub fn conformal_benchmarks(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let classes: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    let records: Vec<NonconformityRecord> = (0..N_CALIBRATION)
        .map(|_| NonconformityRecord::classification(&classes[rng.gen_range(0..3)], rng.gen::<f64>()))
        .collect();
    let calibration = ClassificationCalibration::from_records(&classes, &records).unwrap();
    let residuals: Vec<f64> = (0..N_CALIBRATION).map(|_| rng.gen::<f64>()).collect();
    let residuals = RegressionCalibration::from_residuals(residuals).unwrap();

    let set = calibration.class_set("A").unwrap();
    c.bench_function("p-value lookup", |b| b.iter(|| set.p_value(black_box(0.42))));
    c.bench_function("predict row", |b| {
        b.iter(|| calibration.predict_row(black_box(&[0.1, 0.5, 0.9])))
    });
    c.bench_function("interval", |b| b.iter(|| residuals.predict_interval(black_box(3.0), black_box(0.1))));

    let spec = TableSpec::new(vec![
        ColumnSpec::numeric("P (A)"),
        ColumnSpec::numeric("P (B)"),
        ColumnSpec::numeric("P (C)"),
    ]);
    let rows: Vec<DataRow> = (0..N_PREDICTION)
        .map(|i| {
            let cells = (0..3).map(|_| Cell::from(rng.gen::<f64>())).collect();
            DataRow::new(&format!("Row{}", i), cells)
        })
        .collect();
    let config = ClassificationConfig::new("class").set_keep_columns(KeepColumnsConfig::none());
    let transform = ClassificationTransform::new(&calibration, &spec, &config).unwrap();

    let mut transform_group = c.benchmark_group("transform_partition");
    transform_group.warm_up_time(Duration::from_secs(5));
    transform_group.sample_size(20);
    transform_group.bench_function("transform_partition (Single Threaded)", |b| {
        b.iter(|| transform.transform_partition(black_box(&rows)).unwrap())
    });
    transform_group.bench_function("transform_partition (Multi Threaded)", |b| {
        b.iter(|| transform.transform_partition_par(black_box(&rows)).unwrap())
    });
    transform_group.finish();
}

criterion_group!(benches, conformal_benchmarks);
criterion_main!(benches);
