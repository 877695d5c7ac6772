/// Nearest-rank percentile of an ascending slice.
///
/// `index = ceil(p / 100 * n) - 1`, clamped to `[0, n - 1]`. Empty input
/// yields 0.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
            let index = rank.clamp(0, n as i64 - 1) as usize;
            sorted[index]
        }
    }
}

/// Nearest-rank median.
pub fn median(sorted: &[f64]) -> f64 {
    percentile(sorted, 50.0)
}

/// Copy and sort ascending. NaNs sort last.
pub fn sorted(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.into_iter().collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
