//! Calibration Store
//!
//! Sorted nonconformity scores, per class for classification and global for
//! regression. A store is built once per execution and only read afterwards,
//! so it can be shared by reference between any number of prediction workers.
use crate::calibration::record::NonconformityRecord;
use crate::errors::ConformalError;
use crate::io::JsonIO;
use crate::utils::{is_sorted_ascending, merge_sorted, sort_scores};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

/// Sorted calibration scores of a single class.
///
/// Duplicates are kept, ranks and p-values are frequency sensitive.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "ClassCalibrationSetWire")]
pub struct ClassCalibrationSet {
    class_label: String,
    sorted_scores: Vec<f64>,
}

#[derive(Deserialize)]
struct ClassCalibrationSetWire {
    class_label: String,
    sorted_scores: Vec<f64>,
}

impl TryFrom<ClassCalibrationSetWire> for ClassCalibrationSet {
    type Error = ConformalError;

    fn try_from(wire: ClassCalibrationSetWire) -> Result<Self, Self::Error> {
        check_sorted(&wire.sorted_scores, &wire.class_label)?;
        Ok(ClassCalibrationSet {
            class_label: wire.class_label,
            sorted_scores: wire.sorted_scores,
        })
    }
}

fn check_no_nan(scores: &[f64], scope: &str) -> Result<(), ConformalError> {
    if scores.iter().any(|s| s.is_nan()) {
        return Err(ConformalError::InvalidConfiguration(
            format!("calibration scores of {}", scope),
            "values free of NaN".to_string(),
            "NaN".to_string(),
        ));
    }
    Ok(())
}

fn check_sorted(scores: &[f64], scope: &str) -> Result<(), ConformalError> {
    if scores.iter().any(|s| s.is_nan()) || !is_sorted_ascending(scores) {
        return Err(ConformalError::UnableToRead(format!(
            "calibration scores of {} must be sorted ascending and free of NaN",
            scope
        )));
    }
    Ok(())
}

impl ClassCalibrationSet {
    /// Create a set from unsorted scores.
    ///
    /// Fails with `InvalidConfiguration` when a score is NaN.
    pub fn new(class_label: &str, mut scores: Vec<f64>) -> Result<Self, ConformalError> {
        check_no_nan(&scores, &format!("class '{}'", class_label))?;
        sort_scores(&mut scores);
        Ok(ClassCalibrationSet {
            class_label: class_label.to_string(),
            sorted_scores: scores,
        })
    }

    pub fn empty(class_label: &str) -> Self {
        ClassCalibrationSet {
            class_label: class_label.to_string(),
            sorted_scores: Vec::new(),
        }
    }

    pub fn class_label(&self) -> &str {
        &self.class_label
    }

    pub fn sorted_scores(&self) -> &[f64] {
        &self.sorted_scores
    }

    pub fn len(&self) -> usize {
        self.sorted_scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_scores.is_empty()
    }

    fn merge(&self, other: &ClassCalibrationSet) -> ClassCalibrationSet {
        ClassCalibrationSet {
            class_label: self.class_label.clone(),
            sorted_scores: merge_sorted(&self.sorted_scores, &other.sorted_scores),
        }
    }
}

/// Per-class calibration sets over the full class domain.
///
/// The domain is declared up front, so a class without calibration scores is
/// still represented, by an empty set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "ClassificationCalibrationWire")]
pub struct ClassificationCalibration {
    classes: Vec<String>,
    sets: HashMap<String, ClassCalibrationSet>,
}

#[derive(Deserialize)]
struct ClassificationCalibrationWire {
    classes: Vec<String>,
    sets: HashMap<String, ClassCalibrationSet>,
}

impl TryFrom<ClassificationCalibrationWire> for ClassificationCalibration {
    type Error = ConformalError;

    fn try_from(wire: ClassificationCalibrationWire) -> Result<Self, Self::Error> {
        let unique = wire.classes.iter().collect::<HashSet<_>>().len() == wire.classes.len();
        let consistent = unique
            && wire.classes.len() == wire.sets.len()
            && wire
                .classes
                .iter()
                .all(|c| wire.sets.get(c).is_some_and(|s| s.class_label() == c));
        if !consistent {
            return Err(ConformalError::UnableToRead(
                "calibration sets do not match the class domain".to_string(),
            ));
        }
        Ok(ClassificationCalibration {
            classes: wire.classes,
            sets: wire.sets,
        })
    }
}

impl ClassificationCalibration {
    /// Create a calibration with an empty set for every class of the domain.
    ///
    /// * `classes` - Class domain in declaration order. Repeated labels are dropped.
    pub fn new(classes: &[String]) -> Self {
        let mut ordered = Vec::with_capacity(classes.len());
        let mut sets = HashMap::with_capacity(classes.len());
        for class in classes {
            if !sets.contains_key(class) {
                sets.insert(class.clone(), ClassCalibrationSet::empty(class));
                ordered.push(class.clone());
            }
        }
        ClassificationCalibration { classes: ordered, sets }
    }

    /// Build from classification records.
    ///
    /// Fails with `UnseenClass` when a record's class is outside `classes`.
    pub fn from_records(classes: &[String], records: &[NonconformityRecord]) -> Result<Self, ConformalError> {
        let mut calibration = ClassificationCalibration::new(classes);
        let mut scores: HashMap<&str, Vec<f64>> = HashMap::with_capacity(calibration.classes.len());
        for record in records {
            let label = record.class_label().ok_or_else(|| {
                ConformalError::CalibrationKindMismatch("regression".to_string(), "classification".to_string())
            })?;
            if !calibration.sets.contains_key(label) {
                return Err(ConformalError::UnseenClass(label.to_string()));
            }
            scores.entry(label).or_default().push(record.score());
        }
        for (label, class_scores) in scores {
            calibration
                .sets
                .insert(label.to_string(), ClassCalibrationSet::new(label, class_scores)?);
        }
        Ok(calibration)
    }

    /// Class domain in declaration order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn class_set(&self, class_label: &str) -> Option<&ClassCalibrationSet> {
        self.sets.get(class_label)
    }

    /// Calibration sets in domain order.
    pub fn class_sets(&self) -> impl Iterator<Item = &ClassCalibrationSet> {
        self.classes.iter().filter_map(move |c| self.sets.get(c))
    }

    /// Total number of calibration scores over all classes.
    pub fn len(&self) -> usize {
        self.sets.values().map(ClassCalibrationSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge two calibrations. The domain is the union of both.
    ///
    /// Two identical domains keep their order. Otherwise the union is sorted
    /// by label, so the merged domain does not depend on which side a class
    /// came from or on the order in which partials are merged.
    pub fn merge(&self, other: &ClassificationCalibration) -> ClassificationCalibration {
        let classes = if self.classes == other.classes {
            self.classes.clone()
        } else {
            let mut union: Vec<String> = self.classes.iter().chain(&other.classes).cloned().collect();
            union.sort_unstable();
            union.dedup();
            union
        };
        let mut merged = ClassificationCalibration::new(&classes);
        for class in &classes {
            let set = match (self.sets.get(class), other.sets.get(class)) {
                (Some(a), Some(b)) => a.merge(b),
                (Some(a), None) => a.clone(),
                (None, Some(b)) => b.clone(),
                (None, None) => ClassCalibrationSet::empty(class),
            };
            merged.sets.insert(class.clone(), set);
        }
        merged
    }
}

/// Sorted absolute (or normalized) residuals of a regression model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(try_from = "RegressionCalibrationWire")]
pub struct RegressionCalibration {
    residuals: Vec<f64>,
}

#[derive(Deserialize)]
struct RegressionCalibrationWire {
    residuals: Vec<f64>,
}

impl TryFrom<RegressionCalibrationWire> for RegressionCalibration {
    type Error = ConformalError;

    fn try_from(wire: RegressionCalibrationWire) -> Result<Self, Self::Error> {
        check_sorted(&wire.residuals, "the regression residuals")?;
        Ok(RegressionCalibration {
            residuals: wire.residuals,
        })
    }
}

impl RegressionCalibration {
    /// Create from unsorted residuals.
    ///
    /// Fails with `InvalidConfiguration` when a residual is NaN.
    pub fn from_residuals(mut residuals: Vec<f64>) -> Result<Self, ConformalError> {
        check_no_nan(&residuals, "the regression residuals")?;
        sort_scores(&mut residuals);
        Ok(RegressionCalibration { residuals })
    }

    /// Build from regression records.
    pub fn from_records(records: &[NonconformityRecord]) -> Result<Self, ConformalError> {
        if records.iter().any(|r| r.class_label().is_some()) {
            return Err(ConformalError::CalibrationKindMismatch(
                "classification".to_string(),
                "regression".to_string(),
            ));
        }
        RegressionCalibration::from_residuals(records.iter().map(NonconformityRecord::score).collect())
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn len(&self) -> usize {
        self.residuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residuals.is_empty()
    }

    pub fn merge(&self, other: &RegressionCalibration) -> RegressionCalibration {
        RegressionCalibration {
            residuals: merge_sorted(&self.residuals, &other.residuals),
        }
    }
}

/// Calibration evidence of one execution.
///
/// `Empty` is what aggregating zero partial calibrations yields. It cannot
/// be used for prediction: asking it for either kind of calibration fails
/// with `InsufficientCalibration`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CalibrationStore {
    Classification(ClassificationCalibration),
    Regression(RegressionCalibration),
    Empty,
}

impl CalibrationStore {
    pub fn kind(&self) -> &'static str {
        match self {
            CalibrationStore::Classification(_) => "classification",
            CalibrationStore::Regression(_) => "regression",
            CalibrationStore::Empty => "empty",
        }
    }

    /// Total number of calibration scores.
    pub fn len(&self) -> usize {
        match self {
            CalibrationStore::Classification(c) => c.len(),
            CalibrationStore::Regression(r) => r.len(),
            CalibrationStore::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_classification(&self) -> Result<&ClassificationCalibration, ConformalError> {
        match self {
            CalibrationStore::Classification(c) => Ok(c),
            CalibrationStore::Empty => Err(empty_store_error()),
            other => Err(ConformalError::CalibrationKindMismatch(
                other.kind().to_string(),
                "classification".to_string(),
            )),
        }
    }

    pub fn as_regression(&self) -> Result<&RegressionCalibration, ConformalError> {
        match self {
            CalibrationStore::Regression(r) => Ok(r),
            CalibrationStore::Empty => Err(empty_store_error()),
            other => Err(ConformalError::CalibrationKindMismatch(
                other.kind().to_string(),
                "regression".to_string(),
            )),
        }
    }

    /// Merge two stores of the same kind. `Empty` is the identity.
    pub fn merge(&self, other: &CalibrationStore) -> Result<CalibrationStore, ConformalError> {
        match (self, other) {
            (CalibrationStore::Empty, s) | (s, CalibrationStore::Empty) => Ok(s.clone()),
            (CalibrationStore::Classification(a), CalibrationStore::Classification(b)) => {
                Ok(CalibrationStore::Classification(a.merge(b)))
            }
            (CalibrationStore::Regression(a), CalibrationStore::Regression(b)) => {
                Ok(CalibrationStore::Regression(a.merge(b)))
            }
            (a, b) => Err(ConformalError::CalibrationKindMismatch(
                a.kind().to_string(),
                b.kind().to_string(),
            )),
        }
    }
}

impl From<ClassificationCalibration> for CalibrationStore {
    fn from(c: ClassificationCalibration) -> Self {
        CalibrationStore::Classification(c)
    }
}

impl From<RegressionCalibration> for CalibrationStore {
    fn from(r: RegressionCalibration) -> Self {
        CalibrationStore::Regression(r)
    }
}

impl JsonIO for CalibrationStore {}

fn empty_store_error() -> ConformalError {
    ConformalError::InsufficientCalibration("an empty calibration store".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn classes() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    }

    #[test]
    fn test_class_set_sorted_with_duplicates() {
        let set = ClassCalibrationSet::new("A", vec![0.9, 0.5, 0.9, 0.1]).unwrap();
        assert_eq!(set.sorted_scores(), &[0.1, 0.5, 0.9, 0.9]);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_from_records_keeps_full_domain() {
        let records = vec![
            NonconformityRecord::classification("A", 0.9),
            NonconformityRecord::classification("A", 0.5),
            NonconformityRecord::classification("B", 0.8),
        ];
        let cal = ClassificationCalibration::from_records(&classes(), &records).unwrap();
        assert_eq!(cal.classes(), classes().as_slice());
        assert_eq!(cal.class_set("A").unwrap().sorted_scores(), &[0.5, 0.9]);
        assert!(cal.class_set("C").unwrap().is_empty());
        assert_eq!(cal.len(), 3);
        let labels: Vec<&str> = cal.class_sets().map(|s| s.class_label()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_from_records_rejects_out_of_domain() {
        let records = vec![NonconformityRecord::classification("D", 0.1)];
        assert_eq!(
            ClassificationCalibration::from_records(&classes(), &records),
            Err(ConformalError::UnseenClass("D".to_string()))
        );
        let records = vec![NonconformityRecord::regression(1.0, 2.0)];
        assert!(matches!(
            ClassificationCalibration::from_records(&classes(), &records),
            Err(ConformalError::CalibrationKindMismatch(..))
        ));
    }

    #[test]
    fn test_merge_classification_domain_union() {
        let a = ClassificationCalibration::from_records(
            &["A".to_string(), "B".to_string()],
            &[NonconformityRecord::classification("A", 0.3)],
        )
        .unwrap();
        let b = ClassificationCalibration::from_records(
            &["B".to_string(), "C".to_string()],
            &[
                NonconformityRecord::classification("B", 0.2),
                NonconformityRecord::classification("C", 0.7),
            ],
        )
        .unwrap();
        let merged = a.merge(&b);
        assert_eq!(merged.classes(), classes().as_slice());
        assert_eq!(merged.class_set("A").unwrap().sorted_scores(), &[0.3]);
        assert_eq!(merged.class_set("B").unwrap().sorted_scores(), &[0.2]);
        assert_eq!(merged.class_set("C").unwrap().sorted_scores(), &[0.7]);
    }

    #[test]
    fn test_merge_permuted_domains_commutes() {
        let ab = ClassificationCalibration::from_records(
            &["A".to_string(), "B".to_string()],
            &[NonconformityRecord::classification("A", 0.3)],
        )
        .unwrap();
        let ba = ClassificationCalibration::from_records(
            &["B".to_string(), "A".to_string()],
            &[NonconformityRecord::classification("B", 0.6)],
        )
        .unwrap();
        assert_eq!(ab.merge(&ba), ba.merge(&ab));
        assert_eq!(ab.merge(&ba).classes(), &["A".to_string(), "B".to_string()]);
        // Identical domains keep their declared order.
        assert_eq!(ba.merge(&ba).classes(), &["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_class_set_rejects_nan() {
        let scores = vec![0.5, -f64::NAN, 0.1, 0.9];
        assert!(matches!(
            ClassCalibrationSet::new("A", scores),
            Err(ConformalError::InvalidConfiguration(..))
        ));
        assert!(matches!(
            RegressionCalibration::from_residuals(vec![1.0, f64::NAN]),
            Err(ConformalError::InvalidConfiguration(..))
        ));
        let records = vec![
            NonconformityRecord::classification("A", 0.2),
            NonconformityRecord::classification("A", f64::NAN),
        ];
        assert!(ClassificationCalibration::from_records(&classes(), &records).is_err());
        let set = ClassCalibrationSet::new("A", vec![0.5, 0.1, 0.9]).unwrap();
        assert_eq!(set.sorted_scores(), &[0.1, 0.5, 0.9]);
    }

    #[test]
    fn test_store_kind_access() {
        let store = CalibrationStore::from(RegressionCalibration::from_residuals(vec![2.0, 1.0]).unwrap());
        assert_eq!(store.as_regression().unwrap().residuals(), &[1.0, 2.0]);
        assert!(matches!(
            store.as_classification(),
            Err(ConformalError::CalibrationKindMismatch(..))
        ));
        assert!(matches!(
            CalibrationStore::Empty.as_regression(),
            Err(ConformalError::InsufficientCalibration(_))
        ));
    }

    #[test]
    fn test_store_merge_mismatch() {
        let r = CalibrationStore::from(RegressionCalibration::from_residuals(vec![1.0]).unwrap());
        let c = CalibrationStore::from(ClassificationCalibration::new(&classes()));
        assert!(r.merge(&c).is_err());
        assert_eq!(r.merge(&CalibrationStore::Empty).unwrap(), r);
    }

    #[test]
    fn test_store_json_roundtrip_file() {
        let records = vec![
            NonconformityRecord::classification("A", 0.9),
            NonconformityRecord::classification("B", 0.8),
        ];
        let store = CalibrationStore::from(ClassificationCalibration::from_records(&classes(), &records).unwrap());
        let dir = tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        store.save(&path).unwrap();
        assert_eq!(CalibrationStore::load(&path).unwrap(), store);
    }

    #[test]
    fn test_store_json_rejects_unsorted() {
        let json = r#"{"Regression": {"residuals": [3.0, 1.0]}}"#;
        assert!(matches!(
            CalibrationStore::from_json(json),
            Err(ConformalError::UnableToRead(_))
        ));
        let json = r#"{"Regression": {"residuals": [1.0, 3.0]}}"#;
        assert_eq!(CalibrationStore::from_json(json).unwrap().len(), 2);
    }

    #[test]
    fn test_store_json_rejects_inconsistent_domain() {
        // Repeated class, with the extra set not belonging to the domain.
        let json = r#"{"Classification": {
            "classes": ["A", "A"],
            "sets": {
                "A": {"class_label": "A", "sorted_scores": [0.1]},
                "Z": {"class_label": "Z", "sorted_scores": [0.2]}
            }
        }}"#;
        assert!(matches!(
            CalibrationStore::from_json(json),
            Err(ConformalError::UnableToRead(_))
        ));
        // Set stored under a class but labelled with another.
        let json = r#"{"Classification": {
            "classes": ["A", "B"],
            "sets": {
                "A": {"class_label": "A", "sorted_scores": [0.1]},
                "B": {"class_label": "A", "sorted_scores": [0.2]}
            }
        }}"#;
        assert!(matches!(
            CalibrationStore::from_json(json),
            Err(ConformalError::UnableToRead(_))
        ));
        let json = r#"{"Classification": {
            "classes": ["A", "B"],
            "sets": {
                "A": {"class_label": "A", "sorted_scores": [0.1]},
                "B": {"class_label": "B", "sorted_scores": []}
            }
        }}"#;
        let store = CalibrationStore::from_json(json).unwrap();
        assert_eq!(store.as_classification().unwrap().classes(), &["A".to_string(), "B".to_string()]);
    }
}
