use crate::error::SpectrumError;

/// Affinely maps `series` onto `[0, 1]` in place and returns the original
/// span (max − min). A zero span means the series is constant.
pub fn rescale(series: &mut [f64]) -> Result<f64, SpectrumError> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &value in series.iter() {
        min = min.min(value);
        max = max.max(value);
    }
    let span = max - min;
    if !(span > 0.0) {
        return Err(SpectrumError::DegenerateInput);
    }
    for value in series.iter_mut() {
        *value = (*value - min) / span;
    }
    Ok(span)
}

/// Population standard deviation of the series. Zero spread is rejected as
/// degenerate input.
pub fn standard_deviation(series: &[f64]) -> Result<f64, SpectrumError> {
    if series.is_empty() {
        return Err(SpectrumError::DegenerateInput);
    }
    let mut mean = 0.0;
    let mut square_sum = 0.0;
    for &value in series {
        mean += value;
        square_sum += value * value;
    }
    let len = series.len() as f64;
    mean /= len;
    let spread = (square_sum / len - mean * mean).abs().sqrt();
    if spread == 0.0 {
        return Err(SpectrumError::DegenerateInput);
    }
    Ok(spread)
}

/// Offset table addressing the coordinates of a delay vector:
/// `x_t = (s[t], s[t - τ], …, s[t - (m-1)τ])`.
pub fn embedding_offsets(dim: usize, delay: usize) -> Vec<usize> {
    (0..dim).map(|i| i * delay).collect()
}
