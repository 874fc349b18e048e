//! Weighted multi-horizon momentum score.
//!
//! MOM = 12*ROC(1) + 4*ROC(3) + 2*ROC(6) + ROC(12)

use super::roc::calculate_roc;

pub const MOMENTUM_TERMS: [(usize, f64); 4] = [(1, 12.0), (3, 4.0), (6, 2.0), (12, 1.0)];

pub fn calculate_momentum(prices: &[Option<f64>]) -> Vec<Option<f64>> {
    let rocs: Vec<(Vec<Option<f64>>, f64)> = MOMENTUM_TERMS
        .iter()
        .map(|&(period, weight)| (calculate_roc(prices, period), weight))
        .collect();

    (0..prices.len())
        .map(|i| {
            rocs.iter()
                .map(|(roc, weight)| roc[i].map(|r| r * weight))
                .sum::<Option<f64>>()
        })
        .collect()
}
