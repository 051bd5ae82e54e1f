//! Rolling-window and shift helpers over plain series.

/// Rolling maximum over the last `window` values including the current one.
/// NaN for the first `window - 1` positions or when the window holds a NaN.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling_extreme(values, window, f64::max)
}

/// Rolling minimum, same conventions as [`rolling_max`].
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling_extreme(values, window, f64::min)
}

fn rolling_extreme(values: &[f64], window: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = slice.iter().copied().fold(slice[0], pick);
    }
    result
}

/// Shift a series forward by `k` positions, filling the head with NaN.
pub fn lag(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if k < n {
        result[k..].copy_from_slice(&values[..n - k]);
    }
    result
}
