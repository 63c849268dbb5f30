use engine::CurrencyPair;
use serde::Deserialize;

/// Connector-specific configuration for the Osmosis on-chain DEX pool
/// connector. Each pair is backed by one CosmWasm pool contract; there is
/// no venue-side symbol to discover, only a contract address to smart-query.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    pub base: String,
    pub quote: String,
    pub contract_address: String,
}

impl PoolConfig {
    #[must_use]
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base.clone(), self.quote.clone())
    }
}
