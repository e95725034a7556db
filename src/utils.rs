use crate::errors::ConformalError;
use std::cmp::Ordering;

/// Placeholder substituted by the class label in column-name templates.
pub const TEMPLATE_PLACEHOLDER: &str = "%s";

// Validation
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), ConformalError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(ConformalError::InvalidConfiguration(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate a value lies strictly between 0 and 1.
pub fn validate_error_rate(value: f64, parameter: &str) -> Result<(), ConformalError> {
    if value.is_nan() || value <= 0.0 || value >= 1.0 {
        Err(ConformalError::InvalidConfiguration(
            parameter.to_string(),
            "real value strictly between 0 and 1".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_non_negative_float_parameter(value: f64, parameter: &str) -> Result<(), ConformalError> {
    validate_float_parameter(value, 0.0, f64::INFINITY, parameter)
}

pub fn validate_non_empty(value: &str, parameter: &str) -> Result<(), ConformalError> {
    if value.trim().is_empty() {
        Err(ConformalError::InvalidConfiguration(
            parameter.to_string(),
            "a non-empty value".to_string(),
            "an empty string".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// A per-class template must contain the placeholder, otherwise every class
/// would map onto the same column name.
pub fn validate_template(template: &str, parameter: &str) -> Result<(), ConformalError> {
    if template.contains(TEMPLATE_PLACEHOLDER) {
        Ok(())
    } else {
        Err(ConformalError::InvalidConfiguration(
            parameter.to_string(),
            format!("a template containing '{}'", TEMPLATE_PLACEHOLDER),
            format!("'{}'", template),
        ))
    }
}

/// Substitute the first placeholder of `template` with `label`.
pub fn format_column_name(template: &str, label: &str) -> String {
    template.replacen(TEMPLATE_PLACEHOLDER, label, 1)
}

// Sorted score helpers

#[inline]
pub fn total_order(a: &f64, b: &f64) -> Ordering {
    a.total_cmp(b)
}

/// Sort scores ascending, keeping duplicates.
pub fn sort_scores(scores: &mut [f64]) {
    scores.sort_unstable_by(total_order);
}

pub fn is_sorted_ascending(scores: &[f64]) -> bool {
    scores.windows(2).all(|w| total_order(&w[0], &w[1]) != Ordering::Greater)
}

/// Number of values in a sorted slice strictly less than `v`.
/// Scores never hold NaN, they are rejected when read from a table.
#[inline]
pub fn count_less(sorted: &[f64], v: f64) -> usize {
    sorted.partition_point(|x| *x < v)
}

/// Number of values in a sorted slice greater than or equal to `v`.
#[inline]
pub fn count_greater_or_equal(sorted: &[f64], v: f64) -> usize {
    sorted.len() - count_less(sorted, v)
}

/// Merge two ascending slices into one ascending vector in linear time.
pub fn merge_sorted(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if total_order(&a[i], &b[j]) == Ordering::Greater {
            merged.push(b[j]);
            j += 1;
        } else {
            merged.push(a[i]);
            i += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}

pub fn precision_round(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round() / p
}
