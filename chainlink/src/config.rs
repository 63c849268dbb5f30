use engine::CurrencyPair;
use serde::Deserialize;

/// Connector-specific configuration for the cross-chain EVM oracle
/// connector. Each feed prices one pair against a Chainlink-style
/// `AggregatorV3Interface` contract, called via `eth_call`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub base: String,
    pub quote: String,
    pub contract_address: String,
}

impl FeedConfig {
    #[must_use]
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base.clone(), self.quote.clone())
    }
}
