//! Technical indicators over daily series.
//!
//! Every function returns one entry per input position; `None` marks positions
//! where the indicator is not yet defined.

/// Simple moving average over `length` values.
pub fn sma(values: &[f64], length: usize) -> Vec<Option<f64>> {
    if length == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= length {
            sum -= values[i - length];
        }
        out.push((i + 1 >= length).then(|| sum / length as f64));
    }
    out
}

/// True range of each bar. The first bar has no previous close and is `None`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<Option<f64>> {
    let len = high.len().min(low.len()).min(close.len());
    (0..len)
        .map(|i| {
            if i == 0 {
                return None;
            }
            let prev_close = close[i - 1];
            let range = (high[i] - low[i])
                .max((high[i] - prev_close).abs())
                .max((low[i] - prev_close).abs());
            Some(range)
        })
        .collect()
}

/// Wilder-style moving average: an exponentially weighted mean with
/// `alpha = 1 / length` and bias-adjusted weights.
///
/// Undefined until `length` defined inputs have been seen. Gaps after that
/// decay the weights and repeat the previous value.
pub fn wilder_average(values: &[Option<f64>], length: usize) -> Vec<Option<f64>> {
    if length == 0 {
        return vec![None; values.len()];
    }

    let decay = 1.0 - 1.0 / length as f64;
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut seen = 0usize;

    values
        .iter()
        .map(|value| {
            match value {
                Some(v) if v.is_finite() => {
                    weighted_sum = v + decay * weighted_sum;
                    weight_total = 1.0 + decay * weight_total;
                    seen += 1;
                }
                _ if seen > 0 => {
                    weighted_sum *= decay;
                    weight_total *= decay;
                }
                _ => {}
            }
            (seen >= length && weight_total > 0.0).then(|| weighted_sum / weight_total)
        })
        .collect()
}

/// Average true range over `length` bars.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], length: usize) -> Vec<Option<f64>> {
    wilder_average(&true_range(high, low, close), length)
}

/// Mean of the last `count` values (all of them when shorter).
pub fn tail_mean(values: &[f64], count: usize) -> Option<f64> {
    let tail = tail(values, count);
    (!tail.is_empty()).then(|| tail.iter().sum::<f64>() / tail.len() as f64)
}

pub fn tail_max(values: &[f64], count: usize) -> Option<f64> {
    tail(values, count).iter().copied().reduce(f64::max)
}

pub fn tail_min(values: &[f64], count: usize) -> Option<f64> {
    tail(values, count).iter().copied().reduce(f64::min)
}

fn tail(values: &[f64], count: usize) -> &[f64] {
    &values[values.len().saturating_sub(count)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be defined");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn sma_is_undefined_until_window_fills() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);

        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        approx(out[2], 2.0);
        approx(out[3], 3.0);
        approx(out[4], 4.0);
    }

    #[test]
    fn true_range_uses_previous_close_gaps() {
        let high = [10.0, 11.0, 12.0];
        let low = [9.0, 10.5, 11.5];
        // Gap up over the previous close of 9.2, then gap down from 13.
        let close = [9.2, 13.0, 11.8];

        let out = true_range(&high, &low, &close);

        assert_eq!(out[0], None);
        approx(out[1], 11.0 - 9.2);
        approx(out[2], 13.0 - 11.5);
    }

    #[test]
    fn wilder_average_weights_recent_values() {
        let out = wilder_average(&[Some(1.0), Some(2.0), Some(3.0)], 2);

        assert_eq!(out[0], None);
        approx(out[1], 2.5 / 1.5);
        approx(out[2], 4.25 / 1.75);
    }

    #[test]
    fn wilder_average_skips_leading_gaps_and_holds_through_later_ones() {
        let out = wilder_average(&[None, Some(4.0), Some(4.0), None, Some(4.0)], 2);

        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        approx(out[2], 4.0);
        approx(out[3], 4.0);
        approx(out[4], 4.0);
    }

    #[test]
    fn atr_of_constant_range_is_that_range() {
        let high = vec![11.0; 20];
        let low = vec![9.0; 20];
        let close = vec![10.0; 20];

        let out = atr(&high, &low, &close, 14);

        assert_eq!(out[13], None);
        approx(out[14], 2.0);
        approx(out[19], 2.0);
    }

    #[test]
    fn tail_helpers_cover_last_values() {
        let values = [5.0, 1.0, 3.0, 8.0, 2.0];

        approx(tail_mean(&values, 2), 5.0);
        approx(tail_mean(&values, 10), 19.0 / 5.0);
        approx(tail_max(&values, 3), 8.0);
        approx(tail_min(&values, 3), 2.0);
        assert_eq!(tail_mean(&[], 3), None);
    }
}
