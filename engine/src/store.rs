use std::collections::HashMap;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    pair::{CurrencyPair, TickerPrice},
    telemetry::METRICS,
};

/// How long a ticker stays eligible for `get_ticker_prices` after its last
/// update. Prices are never actively evicted, only filtered at read time.
pub const MAX_TICKER_AGE: Duration = Duration::seconds(60);

/// Shared price cache for one provider.
///
/// A single `RwLock` guards all four maps together: reads (`get_ticker_prices`)
/// take a shared lock, writes (`set_pairs`, `set_ticker_price`) take an
/// exclusive lock. Keeping them under one lock instead of one per map avoids
/// torn reads across `pairs`/`inverse`/`tickers` during a `set_pairs` call.
pub struct TickerStore {
    provider: String,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// provider symbol -> the user-requested pair it is a direct quote for.
    pairs: HashMap<String, CurrencyPair>,
    /// provider symbol -> the user-requested pair it is the *inverse* quote
    /// for (the venue only trades `pair.swap()`).
    inverse: HashMap<String, CurrencyPair>,
    /// user-requested pair (joined) -> latest observed price.
    tickers: HashMap<String, TickerPrice>,
    /// symbol -> on-chain contract/denom address, for providers that need one.
    contracts: HashMap<String, String>,
}

impl TickerStore {
    #[must_use]
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Registers `pair` against the venue's listed symbols, trying the
    /// inverse (swapped) provider symbol before the direct one: a venue
    /// that lists both directions is resolved to whichever direction it
    /// actually trades, preferring the inverse mapping on ambiguity.
    ///
    /// `available_at_venue` is the result of [`crate::connector::Connector::available_pairs`].
    /// When `None` (no enumeration endpoint), both the direct and inverse
    /// provider symbol are registered speculatively, since there is no way
    /// to know ahead of time which one the venue will actually push.
    pub async fn set_pairs(
        &self,
        pair: &CurrencyPair,
        available_at_venue: Option<&[String]>,
        to_provider_symbol: impl Fn(&CurrencyPair) -> String,
    ) {
        let inverse_symbol = to_provider_symbol(&pair.swap());
        let direct_symbol = to_provider_symbol(pair);

        let mut inner = self.inner.write().await;

        match available_at_venue {
            None => {
                inner.pairs.insert(direct_symbol, pair.clone());
                inner.inverse.insert(inverse_symbol, pair.clone());
            }
            Some(available) if available.iter().any(|s| *s == inverse_symbol) => {
                inner.inverse.insert(inverse_symbol, pair.clone());
            }
            Some(available) if available.iter().any(|s| *s == direct_symbol) => {
                inner.pairs.insert(direct_symbol, pair.clone());
            }
            Some(_) => {
                debug!(pair = %pair, "pair not supported at venue");
            }
        }
    }

    /// Sets the contract/denom address a provider symbol resolves to.
    pub async fn set_contract_address(&self, symbol: impl Into<String>, address: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.contracts.insert(symbol.into(), address.into());
    }

    #[must_use]
    pub async fn contract_address(&self, symbol: &str) -> Option<String> {
        self.inner.read().await.contracts.get(symbol).cloned()
    }

    /// Records an observed price for `provider_symbol`. If the symbol was
    /// registered as a direct quote the price is stored as-is; if it was
    /// registered only as the inverse quote the price and volume are
    /// inverted (`price = 1/p`, `volume = v*p`) and stored under the
    /// originally requested pair. Symbols registered as neither are logged
    /// and dropped — a connector subscribed to something nobody asked for.
    ///
    /// A non-positive price (zero or negative) is rejected outright: the
    /// store is left unchanged and no telemetry is emitted.
    pub async fn set_ticker_price(&self, provider_symbol: &str, ticker: TickerPrice) {
        let mut inner = self.inner.write().await;

        if ticker.price <= Decimal::ZERO {
            debug!(symbol = provider_symbol, price = %ticker.price, "dropping non-positive price update");
            return;
        }

        if let Some(pair) = inner.pairs.get(provider_symbol).cloned() {
            inner.tickers.insert(pair.join(), ticker);
            self.record_price(&pair, ticker);
            return;
        }

        if let Some(pair) = inner.inverse.get(provider_symbol).cloned() {
            let inverted = ticker.invert();
            inner.tickers.insert(pair.join(), inverted);
            self.record_price(&pair, inverted);
            return;
        }

        debug!(symbol = provider_symbol, "ticker for unregistered symbol");
    }

    fn record_price(&self, pair: &CurrencyPair, ticker: TickerPrice) {
        let labels = [
            ("provider", self.provider.clone()),
            ("pair", pair.join()),
        ];
        let price = ticker.price.to_string().parse::<f64>().unwrap_or(0.0);
        let volume = ticker.volume.to_string().parse::<f64>().unwrap_or(0.0);
        METRICS.gauge("provider_price", &labels, price);
        METRICS.gauge("provider_volume", &labels, volume);
    }

    /// Returns the latest price for every pair in `pairs` that has an entry
    /// no older than [`MAX_TICKER_AGE`]. Pairs with no entry, or only a
    /// stale one, are silently omitted — this call never errors.
    pub async fn get_ticker_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> HashMap<CurrencyPair, TickerPrice> {
        let inner = self.inner.read().await;
        let now = Utc::now();

        pairs
            .iter()
            .filter_map(|pair| {
                let ticker = inner.tickers.get(&pair.join())?;
                if ticker.is_stale(now, MAX_TICKER_AGE) {
                    debug!(pair = %pair, "stale ticker filtered out");
                    return None;
                }
                Some((pair.clone(), *ticker))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn symbol(pair: &CurrencyPair) -> String {
        pair.join()
    }

    #[tokio::test]
    async fn direct_pair_round_trips_price_unchanged() {
        let store = TickerStore::new("test");
        let pair = CurrencyPair::new("BTC", "USDT");
        store.set_pairs(&pair, None, symbol).await;

        let ticker = TickerPrice::new(Decimal::new(50_000, 0), Decimal::new(10, 0), Utc::now());
        store.set_ticker_price(&symbol(&pair), ticker).await;

        let result = store.get_ticker_prices(&[pair.clone()]).await;
        assert_eq!(result.get(&pair).unwrap().price, ticker.price);
    }

    #[tokio::test]
    async fn inverse_pair_inverts_price_and_scales_volume() {
        let store = TickerStore::new("test");
        // Requested pair is USDTBTC, but the venue only quotes BTCUSDT.
        let requested = CurrencyPair::new("USDT", "BTC");
        store.set_pairs(&requested, None, symbol).await;

        let venue_symbol = symbol(&requested.swap());
        let ticker = TickerPrice::new(Decimal::new(50_000, 0), Decimal::new(2, 0), Utc::now());
        store.set_ticker_price(&venue_symbol, ticker).await;

        let result = store.get_ticker_prices(&[requested.clone()]).await;
        let got = result.get(&requested).unwrap();
        assert_eq!(got.price, Decimal::new(1, 0) / Decimal::new(50_000, 0));
        assert_eq!(got.volume, Decimal::new(100_000, 0));
    }

    #[tokio::test]
    async fn stale_ticker_is_filtered_from_results() {
        let store = TickerStore::new("test");
        let pair = CurrencyPair::new("BTC", "USDT");
        store.set_pairs(&pair, None, symbol).await;

        let old = Utc::now() - Duration::seconds(120);
        let ticker = TickerPrice::new(Decimal::ONE, Decimal::ZERO, old);
        store.set_ticker_price(&symbol(&pair), ticker).await;

        let result = store.get_ticker_prices(&[pair]).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn zero_price_update_leaves_prior_value_intact() {
        let store = TickerStore::new("test");
        let pair = CurrencyPair::new("BTC", "USDT");
        store.set_pairs(&pair, None, symbol).await;

        let good = TickerPrice::new(Decimal::new(100, 0), Decimal::ONE, Utc::now());
        store.set_ticker_price(&symbol(&pair), good).await;

        let zero = TickerPrice::new(Decimal::ZERO, Decimal::ONE, Utc::now());
        store.set_ticker_price(&symbol(&pair), zero).await;

        let result = store.get_ticker_prices(&[pair.clone()]).await;
        assert_eq!(result.get(&pair).unwrap().price, good.price);
    }

    #[tokio::test]
    async fn negative_price_update_leaves_prior_value_intact() {
        let store = TickerStore::new("test");
        let pair = CurrencyPair::new("BTC", "USDT");
        store.set_pairs(&pair, None, symbol).await;

        let good = TickerPrice::new(Decimal::new(100, 0), Decimal::ONE, Utc::now());
        store.set_ticker_price(&symbol(&pair), good).await;

        let negative = TickerPrice::new(Decimal::new(-100, 0), Decimal::ONE, Utc::now());
        store.set_ticker_price(&symbol(&pair), negative).await;

        let result = store.get_ticker_prices(&[pair.clone()]).await;
        assert_eq!(result.get(&pair).unwrap().price, good.price);
    }

    #[tokio::test]
    async fn set_pairs_prefers_inverse_symbol_when_venue_lists_it() {
        let store = TickerStore::new("test");
        let requested = CurrencyPair::new("USDT", "BTC");
        let available = vec![symbol(&requested.swap())];
        store.set_pairs(&requested, Some(&available), symbol).await;

        let ticker = TickerPrice::new(Decimal::new(50_000, 0), Decimal::ONE, Utc::now());
        store.set_ticker_price(&symbol(&requested.swap()), ticker).await;

        let result = store.get_ticker_prices(&[requested.clone()]).await;
        assert!(result.contains_key(&requested));
    }

    #[tokio::test]
    async fn set_pairs_falls_back_to_direct_symbol_when_inverse_unlisted() {
        let store = TickerStore::new("test");
        let pair = CurrencyPair::new("BTC", "USDT");
        let available = vec![symbol(&pair)];
        store.set_pairs(&pair, Some(&available), symbol).await;

        let ticker = TickerPrice::new(Decimal::new(50_000, 0), Decimal::ONE, Utc::now());
        store.set_ticker_price(&symbol(&pair), ticker).await;

        let result = store.get_ticker_prices(&[pair.clone()]).await;
        assert!(result.contains_key(&pair));
    }

    #[tokio::test]
    async fn set_pairs_drops_pair_absent_from_venue_listing() {
        let store = TickerStore::new("test");
        let pair = CurrencyPair::new("BTC", "USDT");
        let available = vec!["SOMETHING_ELSE".to_owned()];
        store.set_pairs(&pair, Some(&available), symbol).await;

        let ticker = TickerPrice::new(Decimal::new(50_000, 0), Decimal::ONE, Utc::now());
        store.set_ticker_price(&symbol(&pair), ticker).await;

        let result = store.get_ticker_prices(&[pair]).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn unregistered_symbol_is_dropped() {
        let store = TickerStore::new("test");
        let ticker = TickerPrice::new(Decimal::ONE, Decimal::ZERO, Utc::now());
        store.set_ticker_price("NOBODYASKED", ticker).await;

        let pairs = vec![CurrencyPair::new("BTC", "USDT")];
        assert!(store.get_ticker_prices(&pairs).await.is_empty());
    }
}
