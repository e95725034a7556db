//! P-Values
//!
//! Ranks and smoothed conformal p-values of prediction scores against the
//! per-class calibration sets, and the derived credibility, confidence and
//! prediction sets.
use crate::calibration::store::{ClassCalibrationSet, ClassificationCalibration};
use crate::errors::ConformalError;
use crate::utils::{count_greater_or_equal, count_less};

/// Rank and p-value of one class score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScore {
    /// 1-based position among the calibration scores.
    pub rank: usize,
    pub p_value: f64,
}

impl ClassCalibrationSet {
    /// Number of calibration scores strictly less than `score`, plus one.
    ///
    /// Calibration scores equal to `score` do not count as less.
    pub fn rank(&self, score: f64) -> usize {
        count_less(self.sorted_scores(), score) + 1
    }

    /// Smoothed conformal p-value `(count(>= score) + 1) / (n + 1)`.
    ///
    /// Fails with `InsufficientCalibration` for a class without calibration
    /// scores instead of returning a p-value of 1.
    pub fn p_value(&self, score: f64) -> Result<f64, ConformalError> {
        if self.is_empty() {
            return Err(ConformalError::InsufficientCalibration(format!(
                "class '{}'",
                self.class_label()
            )));
        }
        let n = self.len() as f64;
        let at_least = count_greater_or_equal(self.sorted_scores(), score) as f64;
        Ok((at_least + 1.0) / (n + 1.0))
    }

    pub fn score(&self, score: f64) -> Result<ClassScore, ConformalError> {
        let p_value = self.p_value(score)?;
        Ok(ClassScore {
            rank: self.rank(score),
            p_value,
        })
    }
}

impl ClassificationCalibration {
    /// Score one prediction row.
    ///
    /// * `scores` - Raw score per class, aligned with `classes()`.
    ///
    /// Returns one `ClassScore` per class in domain order.
    pub fn predict_row(&self, scores: &[f64]) -> Result<Vec<ClassScore>, ConformalError> {
        if scores.len() != self.classes().len() {
            return Err(ConformalError::InvalidConfiguration(
                "scores".to_string(),
                format!("one score per class ({})", self.classes().len()),
                scores.len().to_string(),
            ));
        }
        self.class_sets()
            .zip(scores)
            .map(|(set, score)| set.score(*score))
            .collect()
    }
}

/// Highest p-value of a row, 0 for a row without classes.
pub fn credibility(p_values: &[f64]) -> f64 {
    p_values.iter().copied().fold(0.0, f64::max)
}

/// One minus the second highest p-value of a row.
///
/// With fewer than two classes nothing competes with the best class and the
/// confidence is 1.
pub fn confidence(p_values: &[f64]) -> f64 {
    if p_values.len() < 2 {
        return 1.0;
    }
    let (mut first, mut second) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &p in p_values {
        if p > first {
            second = first;
            first = p;
        } else if p > second {
            second = p;
        }
    }
    1.0 - second
}

/// Classes whose p-value exceeds `error_rate`, in domain order.
pub fn prediction_set<'a>(classes: &'a [String], p_values: &[f64], error_rate: f64) -> Vec<&'a str> {
    classes
        .iter()
        .zip(p_values)
        .filter(|(_, p)| **p > error_rate)
        .map(|(c, _)| c.as_str())
        .collect()
}

/// Prediction set and its quality measures for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationSummary {
    pub classes: Vec<String>,
    pub credibility: f64,
    pub confidence: f64,
}

pub fn summarize(classes: &[String], p_values: &[f64], error_rate: f64) -> ClassificationSummary {
    ClassificationSummary {
        classes: prediction_set(classes, p_values, error_rate)
            .into_iter()
            .map(String::from)
            .collect(),
        credibility: credibility(p_values),
        confidence: confidence(p_values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::precision_round;

    #[test]
    fn test_rank_counts_strictly_less() {
        let set = ClassCalibrationSet::new("A", vec![0.2, 0.5, 0.5, 0.8]).unwrap();
        assert_eq!(set.rank(0.1), 1);
        assert_eq!(set.rank(0.5), 2);
        assert_eq!(set.rank(0.6), 4);
        assert_eq!(set.rank(0.9), 5);
    }

    #[test]
    fn test_p_value_ties_count_as_at_least() {
        let set = ClassCalibrationSet::new("A", vec![0.2, 0.5, 0.5, 0.8]).unwrap();
        assert_eq!(set.p_value(0.5).unwrap(), 4.0 / 5.0);
        assert_eq!(set.p_value(0.9).unwrap(), 1.0 / 5.0);
        assert_eq!(set.p_value(0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_empty_class_fails() {
        let set = ClassCalibrationSet::empty("C");
        assert_eq!(set.rank(0.3), 1);
        assert_eq!(
            set.score(0.3),
            Err(ConformalError::InsufficientCalibration("class 'C'".to_string()))
        );
    }

    #[test]
    fn test_predict_row_length_mismatch() {
        let cal = ClassificationCalibration::new(&["A".to_string(), "B".to_string()]);
        assert!(matches!(
            cal.predict_row(&[0.1]),
            Err(ConformalError::InvalidConfiguration(..))
        ));
    }

    #[test]
    fn test_credibility_confidence() {
        let p = [0.2, 0.9, 0.5];
        assert_eq!(credibility(&p), 0.9);
        assert_eq!(precision_round(confidence(&p), 6), 0.5);
        assert_eq!(confidence(&[0.4]), 1.0);
        assert_eq!(credibility(&[]), 0.0);
        // Two classes sharing the top p-value leave no margin.
        assert_eq!(precision_round(confidence(&[0.7, 0.7]), 6), 0.3);
    }

    #[test]
    fn test_prediction_set_in_domain_order() {
        let classes = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let p = [0.3, 0.05, 0.6];
        assert_eq!(prediction_set(&classes, &p, 0.05), vec!["A", "C"]);
        assert_eq!(prediction_set(&classes, &p, 0.01), vec!["A", "B", "C"]);
        let summary = summarize(&classes, &p, 0.5);
        assert_eq!(summary.classes, vec!["C".to_string()]);
        assert_eq!(summary.credibility, 0.6);
    }
}
