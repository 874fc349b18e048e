//! Target weights and the weight normalizer.

use std::collections::{BTreeMap, HashSet};

use super::price_table::{tradable_price, PriceMap};

/// Ticker → weight, iterated in ascending ticker order.
pub type TargetWeights = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightsError {
    #[error("expected ticker/weight pairs, got {0} tokens")]
    OddTokenCount(usize),

    #[error("at least two assets are required, got {0}")]
    TooFewAssets(usize),

    #[error("invalid weight {weight:?} for {ticker}")]
    InvalidWeight { ticker: String, weight: String },

    #[error("negative weight {weight} for {ticker}")]
    NegativeWeight { ticker: String, weight: f64 },

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Rescale to sum to one. An all-zero mapping becomes equal weights.
pub fn normalize(weights: &TargetWeights) -> TargetWeights {
    if weights.is_empty() {
        return TargetWeights::new();
    }

    let total: f64 = weights.values().sum();
    if total == 0.0 {
        let equal = 1.0 / weights.len() as f64;
        return weights.keys().map(|t| (t.clone(), equal)).collect();
    }

    weights
        .iter()
        .map(|(t, w)| (t.clone(), w / total))
        .collect()
}

/// Keep tickers with a defined positive price, then normalize.
pub fn active_weights(original: &TargetWeights, prices: &PriceMap) -> TargetWeights {
    let tradable: TargetWeights = original
        .iter()
        .filter(|(ticker, _)| tradable_price(prices, ticker).is_some())
        .map(|(t, w)| (t.clone(), *w))
        .collect();
    normalize(&tradable)
}

/// Parse `TICKER WEIGHT TICKER WEIGHT ...` tokens. Tickers are upper-cased.
pub fn parse_weight_pairs<S: AsRef<str>>(tokens: &[S]) -> Result<TargetWeights, WeightsError> {
    if tokens.len() % 2 != 0 {
        return Err(WeightsError::OddTokenCount(tokens.len()));
    }
    let assets = tokens.len() / 2;
    if assets < 2 {
        return Err(WeightsError::TooFewAssets(assets));
    }

    let mut seen = HashSet::new();
    let mut weights = TargetWeights::new();
    for pair in tokens.chunks_exact(2) {
        let ticker = pair[0].as_ref().trim().to_uppercase();
        let raw = pair[1].as_ref().trim();
        let weight: f64 = raw
            .parse()
            .ok()
            .filter(|w: &f64| w.is_finite())
            .ok_or_else(|| WeightsError::InvalidWeight {
                ticker: ticker.clone(),
                weight: raw.to_string(),
            })?;
        if weight < 0.0 {
            return Err(WeightsError::NegativeWeight { ticker, weight });
        }
        if !seen.insert(ticker.clone()) {
            return Err(WeightsError::DuplicateTicker(ticker));
        }
        weights.insert(ticker, weight);
    }

    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> TargetWeights {
        pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
    }

    #[test]
    fn normalize_empty() {
        assert!(normalize(&TargetWeights::new()).is_empty());
    }

    #[test]
    fn normalize_all_zero_is_equal_weight() {
        let n = normalize(&weights(&[("A", 0.0), ("B", 0.0)]));
        assert_eq!(n["A"], 0.5);
        assert_eq!(n["B"], 0.5);
    }

    #[test]
    fn normalize_divides_by_sum() {
        let n = normalize(&weights(&[("A", 3.0), ("B", 1.0)]));
        assert!((n["A"] - 0.75).abs() < f64::EPSILON);
        assert!((n["B"] - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn active_weights_drops_unpriced_and_rescales() {
        let prices = PriceMap::from([("A".to_string(), 10.0), ("C".to_string(), 0.0)]);
        let w = active_weights(&weights(&[("A", 0.6), ("B", 0.2), ("C", 0.2)]), &prices);
        assert_eq!(w.len(), 1);
        assert!((w["A"] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn active_weights_empty_when_nothing_priced() {
        let w = active_weights(&weights(&[("A", 0.5), ("B", 0.5)]), &PriceMap::new());
        assert!(w.is_empty());
    }

    #[test]
    fn parse_pairs_ok() {
        let w = parse_weight_pairs(&["spy", "0.6", "AGG", "0.4"]).unwrap();
        assert_eq!(w, weights(&[("AGG", 0.4), ("SPY", 0.6)]));
    }

    #[test]
    fn parse_pairs_rejects_bad_shapes() {
        assert_eq!(
            parse_weight_pairs(&["SPY", "0.6", "AGG"]),
            Err(WeightsError::OddTokenCount(3))
        );
        assert_eq!(
            parse_weight_pairs(&["SPY", "1.0"]),
            Err(WeightsError::TooFewAssets(1))
        );
        assert_eq!(
            parse_weight_pairs(&["SPY", "0.5", "SPY", "0.5"]),
            Err(WeightsError::DuplicateTicker("SPY".into()))
        );
        assert!(matches!(
            parse_weight_pairs(&["SPY", "abc", "AGG", "0.5"]),
            Err(WeightsError::InvalidWeight { .. })
        ));
        assert!(matches!(
            parse_weight_pairs(&["SPY", "-0.1", "AGG", "0.5"]),
            Err(WeightsError::NegativeWeight { .. })
        ));
    }
}
