use crate::error::{Error, Result};

/// Mean absolute percentage error over positions with a nonzero true value.
///
/// Zero-valued truths are skipped; if every position is skipped the metric
/// is degenerate and an error is returned instead of a non-finite number.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let mut total = 0.0;
    let mut count = 0usize;
    for (&truth, &estimate) in actual.iter().zip(predicted) {
        if truth != 0.0 {
            total += ((truth - estimate) / truth).abs();
            count += 1;
        }
    }
    if count == 0 {
        return Err(Error::DegenerateMetric(
            "every true value is zero, percentage error is undefined".into(),
        ));
    }
    Ok(total / count as f64)
}

/// Root mean square error over all positions.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    if actual.is_empty() {
        return Err(Error::DegenerateMetric("no positions to score".into()));
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(&truth, &estimate)| (truth - estimate) * (truth - estimate))
        .sum();
    Ok((total / actual.len() as f64).sqrt())
}

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(Error::Shape(format!(
            "metric inputs must have equal lengths, got {} and {}",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}
