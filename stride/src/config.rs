use engine::CurrencyPair;
use serde::Deserialize;

/// Connector-specific configuration for the liquid-staking redemption-rate
/// poller. Each entry prices one liquid-staked denom (`stATOM`) against its
/// underlying (`ATOM`) via Stride's host-zone redemption rate.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub redemptions: Vec<RedemptionConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedemptionConfig {
    pub liquid_staked: String,
    pub underlying: String,
    pub host_denom: String,
}

impl RedemptionConfig {
    #[must_use]
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.liquid_staked.clone(), self.underlying.clone())
    }
}
