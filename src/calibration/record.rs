use crate::errors::ConformalError;
use serde::{Deserialize, Serialize};

/// One calibration example's nonconformity score.
///
/// Classification records carry the true class label, regression records do not.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NonconformityRecord {
    class_label: Option<String>,
    score: f64,
}

impl NonconformityRecord {
    /// Record the score a model assigned to an example's true class.
    pub fn classification(class_label: &str, score: f64) -> Self {
        NonconformityRecord {
            class_label: Some(class_label.to_string()),
            score,
        }
    }

    /// Record the absolute residual `|actual - predicted|`.
    pub fn regression(actual: f64, predicted: f64) -> Self {
        NonconformityRecord {
            class_label: None,
            score: (actual - predicted).abs(),
        }
    }

    /// Record the absolute residual scaled by a per-example difficulty.
    ///
    /// * `difficulty` - Difficulty estimate plus smoothing, must be positive.
    pub fn normalized_regression(actual: f64, predicted: f64, difficulty: f64) -> Result<Self, ConformalError> {
        if !difficulty.is_finite() || difficulty <= 0.0 {
            return Err(ConformalError::InvalidConfiguration(
                "difficulty".to_string(),
                "a positive finite value".to_string(),
                difficulty.to_string(),
            ));
        }
        Ok(NonconformityRecord {
            class_label: None,
            score: (actual - predicted).abs() / difficulty,
        })
    }

    pub fn class_label(&self) -> Option<&str> {
        self.class_label.as_deref()
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_record() {
        let r = NonconformityRecord::classification("A", 0.9);
        assert_eq!(r.class_label(), Some("A"));
        assert_eq!(r.score(), 0.9);
    }

    #[test]
    fn test_regression_record_is_absolute() {
        assert_eq!(NonconformityRecord::regression(3.0, 5.0).score(), 2.0);
        assert_eq!(NonconformityRecord::regression(5.0, 3.0).score(), 2.0);
        assert_eq!(NonconformityRecord::regression(5.0, 3.0).class_label(), None);
    }

    #[test]
    fn test_normalized_record() {
        let r = NonconformityRecord::normalized_regression(5.0, 3.0, 0.5).unwrap();
        assert_eq!(r.score(), 4.0);
        assert!(NonconformityRecord::normalized_regression(5.0, 3.0, 0.0).is_err());
        assert!(NonconformityRecord::normalized_regression(5.0, 3.0, f64::NAN).is_err());
    }
}
