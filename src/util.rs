/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean absolute error between an observed series and a scaled simulated series.
///
/// Both slices must have the same length; the caller slices them to a common
/// window before calling.
pub fn mae(observed: &[f64], simulated: &[f64], scale: f64) -> f64 {
    debug_assert_eq!(observed.len(), simulated.len());
    if observed.is_empty() {
        return 0.0;
    }
    observed
        .iter()
        .zip(simulated)
        .map(|(o, s)| (o - scale * s).abs())
        .sum::<f64>()
        / observed.len() as f64
}
