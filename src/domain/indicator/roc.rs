//! ROC (Rate of Change) over a column of optional prices.
//!
//! ROC(n)[i] = P[i] / P[i-n] - 1, as a fraction.
//! Undefined for the first n rows, when either price is undefined, or when
//! P[i-n] is not positive.

pub fn calculate_roc(prices: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut values = Vec::with_capacity(prices.len());

    for i in 0..prices.len() {
        let value = if i >= period {
            match (prices[i], prices[i - period]) {
                (Some(curr), Some(prev)) if prev > 0.0 => Some(curr / prev - 1.0),
                _ => None,
            }
        } else {
            None
        };
        values.push(value);
    }

    values
}
