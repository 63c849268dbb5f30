use engine::CurrencyPair;
use serde::Deserialize;

/// Connector-specific configuration for the inverse-pair CEX connector.
///
/// Each `PairConfig` is the pair as the *caller* wants it quoted; the venue
/// itself only lists the swapped direction (KuCoin lists `BTC-USDT`, never
/// `USDT-BTC`), which is why this connector exists as a second example
/// alongside `binance`'s direct-pair case.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pairs: Vec<PairConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PairConfig {
    pub base: String,
    pub quote: String,
}

impl From<&PairConfig> for CurrencyPair {
    fn from(p: &PairConfig) -> Self {
        CurrencyPair::new(p.base.clone(), p.quote.clone())
    }
}
