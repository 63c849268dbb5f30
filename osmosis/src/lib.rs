pub mod config;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use engine::{
    Connector, CurrencyPair, Endpoint, PollingDriver, ProviderBase, ProviderService,
    ServiceFactory, SubscribeCurrencyPairs, TickerPrice,
    decimal::{decimals_factor, parse_decimal},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use config::Config;

/// On-chain DEX pool connector: polls a CosmWasm pool contract's asset
/// balances over Cosmos REST rather than holding a connection open. There
/// is no push feed for pool reserves, so the connector's state lives in
/// `PollCore` (the `Arc`'d [`Connector`] impl [`PollingDriver`] drives) and
/// `Provider` is a thin handle around it.
pub struct Provider {
    core: Arc<PollCore>,
}

struct PollCore {
    base: ProviderBase,
    pairs: RwLock<Vec<CurrencyPair>>,
}

#[async_trait]
impl Connector for PollCore {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn to_provider_symbol(&self, pair: &CurrencyPair) -> String {
        pair.join()
    }

    async fn poll(&self) -> engine::Result<()> {
        let pairs = self.pairs.read().await.clone();
        for pair in pairs {
            let symbol = self.to_provider_symbol(&pair);
            let Some(contract) = self.base.store.contract_address(&symbol).await else {
                debug!(symbol, "no pool contract registered for pair, skipping");
                continue;
            };

            let ticker = self.query_pool(&contract).await?;
            self.base.store.set_ticker_price(&symbol, ticker).await;
        }
        Ok(())
    }
}

impl PollCore {
    async fn query_pool(&self, contract: &str) -> engine::Result<TickerPrice> {
        let query = STANDARD.encode(br#"{"pool":{}}"#);
        let path = format!("/cosmwasm/wasm/v1/contract/{contract}/smart/{query}");

        let body = self.base.http.get(&path).await.map_err(|e| {
            engine::ProviderError::UpstreamTransient {
                provider: contract.to_owned(),
                reason: e.to_string(),
            }
        })?;

        let parsed: SmartQueryResponse =
            serde_json::from_str(&body).map_err(|e| engine::ProviderError::Decode {
                provider: contract.to_owned(),
                reason: e.to_string(),
            })?;

        let [asset0, asset1] = &parsed.data.assets[..] else {
            return Err(engine::ProviderError::Decode {
                provider: contract.to_owned(),
                reason: "pool response did not contain exactly two assets".to_owned(),
            });
        };

        let reserve0 = parse_decimal(&asset0.amount, "reserve0")?;
        let reserve1 = parse_decimal(&asset1.amount, "reserve1")?;

        if reserve0 <= Decimal::ZERO {
            return Err(engine::ProviderError::Decode {
                provider: contract.to_owned(),
                reason: "pool reserve0 is non-positive".to_owned(),
            });
        }

        let price = reserve1 / reserve0 / decimals_factor(0);
        Ok(TickerPrice::new(price, reserve1, Utc::now()))
    }
}

#[async_trait]
impl Connector for Provider {
    fn base(&self) -> &ProviderBase {
        &self.core.base
    }

    fn to_provider_symbol(&self, pair: &CurrencyPair) -> String {
        self.core.to_provider_symbol(pair)
    }

    async fn poll(&self) -> engine::Result<()> {
        self.core.poll().await
    }
}

#[async_trait]
impl SubscribeCurrencyPairs for Provider {
    async fn subscribe_currency_pairs(self: Arc<Self>, pairs: &[CurrencyPair]) {
        let available = self.available_pairs().await;
        for pair in pairs {
            self.core
                .base
                .store
                .set_pairs(pair, available.as_deref(), |p| self.to_provider_symbol(p))
                .await;
        }
        self.core.pairs.write().await.extend(pairs.iter().cloned());
    }
}

#[async_trait]
impl ProviderService for Provider {
    async fn start(&self, token: CancellationToken) -> anyhow::Result<()> {
        let interval = self
            .core
            .base
            .endpoint
            .poll_interval
            .unwrap_or(Duration::from_secs(10));
        let driver = PollingDriver::new(self.core.clone(), interval);
        driver.run(token).await;
        Ok(())
    }
}

#[derive(Deserialize)]
struct SmartQueryResponse {
    data: PoolData,
}

#[derive(Deserialize)]
struct PoolData {
    assets: Vec<Asset>,
}

#[derive(Deserialize)]
struct Asset {
    amount: String,
}

#[async_trait]
impl ServiceFactory<dyn ProviderService> for Provider {
    type Config = (Endpoint, Config);

    async fn from_config(config: &Self::Config) -> anyhow::Result<Arc<dyn ProviderService>> {
        let (endpoint, cfg) = config.clone();
        let endpoint = engine::resolve_endpoint(endpoint)?;
        let base = ProviderBase::init(endpoint)?;

        let core = Arc::new(PollCore {
            base,
            pairs: RwLock::new(Vec::new()),
        });

        for pool in &cfg.pools {
            let symbol = core.to_provider_symbol(&pool.pair());
            core.base
                .store
                .set_contract_address(symbol, pool.contract_address.clone())
                .await;
        }

        let provider = Arc::new(Provider { core });
        let pairs: Vec<CurrencyPair> = cfg.pools.iter().map(config::PoolConfig::pair).collect();
        provider.clone().subscribe_currency_pairs(&pairs).await;

        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use engine::Endpoint;
    use mockito::Server;

    use super::*;

    fn test_core(base_url: String) -> PollCore {
        let endpoint = Endpoint {
            name: "osmosis".to_owned(),
            urls: vec![base_url],
            ..Endpoint::default()
        };
        PollCore {
            base: ProviderBase::init(endpoint).unwrap(),
            pairs: RwLock::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn query_pool_prices_second_asset_against_first() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/cosmwasm/wasm/v1/contract/.*/smart/.*".to_owned()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"assets":[{"amount":"1000000"},{"amount":"50000000000"}]}}"#)
            .create_async()
            .await;

        let core = test_core(server.url());
        let ticker = core.query_pool("osmo1pool").await.unwrap();

        mock.assert_async().await;
        assert_eq!(ticker.price, Decimal::new(50_000, 0));
        assert_eq!(ticker.volume, Decimal::new(50_000_000_000, 0));
    }

    #[tokio::test]
    async fn query_pool_rejects_malformed_asset_count() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/cosmwasm/wasm/v1/contract/.*".to_owned()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"assets":[{"amount":"1"}]}}"#)
            .create_async()
            .await;

        let core = test_core(server.url());
        assert!(core.query_pool("osmo1pool").await.is_err());
    }
}
