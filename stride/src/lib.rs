pub mod config;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use engine::{
    Connector, CurrencyPair, Endpoint, PollingDriver, ProviderBase, ProviderService,
    ServiceFactory, SubscribeCurrencyPairs, TickerPrice, decimal::parse_decimal,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use config::Config;

/// Liquid-staking redemption-rate REST poller. There is no push feed for a
/// host zone's redemption rate, so this is a [`PollingDriver`] consumer like
/// [`osmosis`]'s pool connector, not a websocket one.
pub struct Provider {
    core: Arc<PollCore>,
}

struct PollCore {
    base: ProviderBase,
    pairs: RwLock<Vec<(CurrencyPair, String)>>,
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
        let entries = self.pairs.read().await.clone();
        for (pair, host_denom) in entries {
            let symbol = self.to_provider_symbol(&pair);
            let ticker = self.query_redemption_rate(&host_denom).await?;
            self.base.store.set_ticker_price(&symbol, ticker).await;
        }
        Ok(())
    }
}

impl PollCore {
    async fn query_redemption_rate(&self, host_denom: &str) -> engine::Result<TickerPrice> {
        let path = format!("/Stride-Labs/stride/stakeibc/host_zone/{host_denom}");

        let body = self.base.http.get(&path).await.map_err(|e| {
            engine::ProviderError::UpstreamTransient {
                provider: host_denom.to_owned(),
                reason: e.to_string(),
            }
        })?;

        let parsed: HostZoneResponse =
            serde_json::from_str(&body).map_err(|e| engine::ProviderError::Decode {
                provider: host_denom.to_owned(),
                reason: e.to_string(),
            })?;

        let price = parse_decimal(&parsed.host_zone.redemption_rate, "redemption_rate")?;
        if price <= rust_decimal::Decimal::ZERO {
            return Err(engine::ProviderError::Decode {
                provider: host_denom.to_owned(),
                reason: "redemption rate was non-positive".to_owned(),
            });
        }

        // Stride's host-zone query does not surface the block time or epoch
        // the redemption rate was last updated at, so this stamps ingest
        // time rather than a venue-native observation time. A known
        // normalization gap, not an oversight.
        Ok(TickerPrice::new(price, rust_decimal::Decimal::ZERO, Utc::now()))
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
            .unwrap_or(Duration::from_secs(30));
        let driver = PollingDriver::new(self.core.clone(), interval);
        driver.run(token).await;
        Ok(())
    }
}

#[derive(Deserialize)]
struct HostZoneResponse {
    host_zone: HostZone,
}

#[derive(Deserialize)]
struct HostZone {
    redemption_rate: String,
}

#[async_trait]
impl ServiceFactory<dyn ProviderService> for Provider {
    type Config = (Endpoint, Config);

    async fn from_config(config: &Self::Config) -> anyhow::Result<Arc<dyn ProviderService>> {
        let (endpoint, cfg) = config.clone();
        let endpoint = engine::resolve_endpoint(endpoint)?;
        let base = ProviderBase::init(endpoint)?;

        let entries: Vec<(CurrencyPair, String)> = cfg
            .redemptions
            .iter()
            .map(|r| (r.pair(), r.host_denom.clone()))
            .collect();

        if entries.is_empty() {
            debug!("stride connector configured with no redemption pairs");
        }

        let core = Arc::new(PollCore {
            base,
            pairs: RwLock::new(entries.clone()),
        });

        let provider = Arc::new(Provider { core });
        let pairs: Vec<CurrencyPair> = entries.into_iter().map(|(p, _)| p).collect();
        provider.clone().subscribe_currency_pairs(&pairs).await;

        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use engine::Endpoint;
    use mockito::Server;
    use rust_decimal::Decimal;

    use super::*;

    fn test_core(base_url: String) -> PollCore {
        let endpoint = Endpoint {
            name: "stride".to_owned(),
            urls: vec![base_url],
            ..Endpoint::default()
        };
        PollCore {
            base: ProviderBase::init(endpoint).unwrap(),
            pairs: RwLock::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn query_redemption_rate_parses_host_zone_response() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/Stride-Labs/stride/stakeibc/host_zone/uatom")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"host_zone":{"redemption_rate":"1.142857"}}"#)
            .create_async()
            .await;

        let core = test_core(server.url());
        let ticker = core.query_redemption_rate("uatom").await.unwrap();

        mock.assert_async().await;
        assert_eq!(ticker.price, Decimal::new(1_142_857, 6));
    }

    #[tokio::test]
    async fn query_redemption_rate_rejects_zero() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/Stride-Labs/stride/stakeibc/host_zone/uatom")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"host_zone":{"redemption_rate":"0"}}"#)
            .create_async()
            .await;

        let core = test_core(server.url());
        assert!(core.query_redemption_rate("uatom").await.is_err());
    }
}
