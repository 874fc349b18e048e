//! Simple moving average over a column of optional values.
//!
//! O(n) sliding window. A row is defined only when the trailing `period`
//! rows are all defined.

pub fn calculate_sma(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;
    let mut defined = 0usize;

    for i in 0..values.len() {
        if let Some(v) = values[i] {
            window_sum += v;
            defined += 1;
        }
        if i >= period {
            if let Some(v) = values[i - period] {
                window_sum -= v;
                defined -= 1;
            }
        }

        let sma = (defined == period).then(|| window_sum / period as f64);
        out.push(sma);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warmup_and_values() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].into_iter().map(Some).collect();
        let sma = calculate_sma(&values, 3);
        assert_eq!(sma[0], None);
        assert_eq!(sma[1], None);
        assert!((sma[2].unwrap() - 2.0).abs() < f64::EPSILON);
        assert!((sma[3].unwrap() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_requires_full_window() {
        let values = vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let sma = calculate_sma(&values, 2);
        assert_eq!(sma[1], None);
        assert_eq!(sma[2], None);
        assert!((sma[3].unwrap() - 3.5).abs() < f64::EPSILON);
        assert!((sma[4].unwrap() - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_zero_period_is_undefined() {
        assert_eq!(calculate_sma(&[Some(1.0)], 0), vec![None]);
    }
}
