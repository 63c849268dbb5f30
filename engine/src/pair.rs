use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A base/quote currency pair, e.g. `BTC`/`USDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    #[must_use]
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// `{base}{quote}` joined with no separator, the canonical key used
    /// throughout the ticker store.
    #[must_use]
    pub fn join(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    #[must_use]
    pub fn swap(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.join())
    }
}

/// A single observed price point for a pair from one provider.
///
/// `price` must be strictly positive and `volume` non-negative; both are
/// `Decimal` with at least 18 fractional digits of precision (see
/// [`crate::decimal::parse_decimal`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickerPrice {
    pub price: Decimal,
    pub volume: Decimal,
    pub time: DateTime<Utc>,
}

impl TickerPrice {
    #[must_use]
    pub fn new(price: Decimal, volume: Decimal, time: DateTime<Utc>) -> Self {
        Self {
            price,
            volume,
            time,
        }
    }

    /// The inverse-pair view of this price: `1/price` and `volume*price`,
    /// keyed by the pair the caller actually requested (see
    /// [`crate::store::TickerStore::set_ticker_price`]).
    #[must_use]
    pub fn invert(&self) -> Self {
        Self {
            price: crate::decimal::invert(self.price),
            volume: self.volume * self.price,
            time: self.time,
        }
    }

    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.time) > max_age
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn join_has_no_separator() {
        let pair = CurrencyPair::new("BTC", "USDT");
        assert_eq!(pair.join(), "BTCUSDT");
    }

    #[test]
    fn swap_exchanges_base_and_quote() {
        let pair = CurrencyPair::new("BTC", "USDT");
        assert_eq!(pair.swap(), CurrencyPair::new("USDT", "BTC"));
    }

    #[test]
    fn invert_produces_reciprocal_price_and_scaled_volume() {
        let t = TickerPrice::new(Decimal::new(2, 0), Decimal::new(10, 0), Utc::now());
        let inverted = t.invert();
        assert_eq!(inverted.price, Decimal::new(5, 1));
        assert_eq!(inverted.volume, Decimal::new(20, 0));
    }

    #[test]
    fn staleness_cutoff_is_exclusive_of_max_age() {
        let now = Utc::now();
        let fresh = TickerPrice::new(Decimal::ONE, Decimal::ZERO, now - Duration::seconds(30));
        let stale = TickerPrice::new(Decimal::ONE, Decimal::ZERO, now - Duration::seconds(61));
        assert!(!fresh.is_stale(now, Duration::seconds(60)));
        assert!(stale.is_stale(now, Duration::seconds(60)));
    }
}
