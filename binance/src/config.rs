use engine::CurrencyPair;
use serde::Deserialize;

/// Connector-specific configuration for the direct-pair CEX connector.
///
/// Endpoint connection details (URLs, ping settings) come from
/// [`engine::Endpoint`]'s built-in `"binance"` defaults; this struct only
/// carries what this venue's connector needs beyond that: the pairs to
/// subscribe to at startup.
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
