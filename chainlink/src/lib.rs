pub mod config;

use std::{sync::Arc, sync::LazyLock, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use engine::{
    Connector, CurrencyPair, Endpoint, PollingDriver, ProviderBase, ProviderService,
    ServiceFactory, SubscribeCurrencyPairs, TickerPrice,
    decimal::{decimals_factor, keccak256, parse_decimal},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use config::Config;

/// `latestAnswer()`'s 4-byte selector, derived the same way `solidity`
/// derives any function selector: the first 4 bytes of the Keccak-256 hash
/// of its canonical signature.
static LATEST_ANSWER_SELECTOR: LazyLock<String> =
    LazyLock::new(|| hex_encode(&keccak256(b"latestAnswer()")[..4]));

/// `decimals()`'s selector, used once per feed to learn its fixed-point scale.
static DECIMALS_SELECTOR: LazyLock<String> =
    LazyLock::new(|| hex_encode(&keccak256(b"decimals()")[..4]));

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Cross-chain EVM oracle connector: polls a Chainlink-style
/// `AggregatorV3Interface` contract's `latestAnswer()` over JSON-RPC
/// `eth_call`. No publish-time field is read back (`latestAnswer` is a pure
/// view call with no timestamp in its return value), so, like `stride`,
/// this stamps ingest time.
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
        for (pair, contract) in entries {
            let symbol = self.to_provider_symbol(&pair);
            let ticker = self.query_feed(&contract).await?;
            self.base.store.set_ticker_price(&symbol, ticker).await;
        }
        Ok(())
    }
}

impl PollCore {
    async fn eth_call(&self, contract: &str, selector: &str) -> engine::Result<String> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{"to": contract, "data": format!("0x{selector}")}, "latest"],
            "id": 1,
        });

        let raw = self
            .base
            .http
            .post_json("/", &body)
            .await
            .map_err(|e| engine::ProviderError::UpstreamTransient {
                provider: contract.to_owned(),
                reason: e.to_string(),
            })?;

        let parsed: JsonRpcResponse =
            serde_json::from_str(&raw).map_err(|e| engine::ProviderError::Decode {
                provider: contract.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(parsed.result)
    }

    async fn query_feed(&self, contract: &str) -> engine::Result<TickerPrice> {
        let answer_hex = self.eth_call(contract, &LATEST_ANSWER_SELECTOR).await?;
        let decimals_hex = self.eth_call(contract, &DECIMALS_SELECTOR).await?;

        let answer = parse_eth_call_uint(&answer_hex, contract)?;
        let decimals = parse_eth_call_uint(&decimals_hex, contract)?;
        let decimals: u32 = decimals
            .try_into()
            .map_err(|_| engine::ProviderError::Decode {
                provider: contract.to_owned(),
                reason: "decimals() returned an out-of-range value".to_owned(),
            })?;

        let price = parse_decimal(&answer.to_string(), "latestAnswer")? / decimals_factor(decimals);
        if price <= Decimal::ZERO {
            return Err(engine::ProviderError::Decode {
                provider: contract.to_owned(),
                reason: "latestAnswer() returned a non-positive value".to_owned(),
            });
        }

        Ok(TickerPrice::new(price, Decimal::ZERO, Utc::now()))
    }
}

fn parse_eth_call_uint(hex: &str, contract: &str) -> engine::Result<u128> {
    let trimmed = hex.trim_start_matches("0x");
    let tail = &trimmed[trimmed.len().saturating_sub(32)..];
    u128::from_str_radix(tail, 16).map_err(|e| engine::ProviderError::Decode {
        provider: contract.to_owned(),
        reason: format!("invalid eth_call return value: {e}"),
    })
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: String,
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
            .unwrap_or(Duration::from_secs(15));
        let driver = PollingDriver::new(self.core.clone(), interval);
        driver.run(token).await;
        Ok(())
    }
}

#[async_trait]
impl ServiceFactory<dyn ProviderService> for Provider {
    type Config = (Endpoint, Config);

    async fn from_config(config: &Self::Config) -> anyhow::Result<Arc<dyn ProviderService>> {
        let (endpoint, cfg) = config.clone();
        let endpoint = engine::resolve_endpoint(endpoint)?;
        let base = ProviderBase::init(endpoint)?;

        let entries: Vec<(CurrencyPair, String)> = cfg
            .feeds
            .iter()
            .map(|f| (f.pair(), f.contract_address.clone()))
            .collect();

        if entries.is_empty() {
            debug!("chainlink connector configured with no feeds");
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
    use super::*;

    #[test]
    fn latest_answer_selector_matches_known_value() {
        // latestAnswer() selector per the standard AggregatorV3Interface ABI.
        assert_eq!(*LATEST_ANSWER_SELECTOR, "50d25bc1");
    }

    #[test]
    fn parses_right_aligned_eth_call_uint() {
        let hex = format!("0x{:0>64}", "2a");
        assert_eq!(parse_eth_call_uint(&hex, "0xfeed").unwrap(), 42);
    }

    #[tokio::test]
    async fn query_feed_scales_answer_by_decimals() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(|request| {
                let body: serde_json::Value = serde_json::from_slice(request.body().unwrap()).unwrap();
                let selector = body["params"][0]["data"].as_str().unwrap();
                let result = if selector == format!("0x{}", *LATEST_ANSWER_SELECTOR) {
                    format!("0x{:0>64x}", 314_159_000_000u128)
                } else {
                    format!("0x{:0>64x}", 8u128)
                };
                serde_json::json!({"jsonrpc":"2.0","id":1,"result":result}).to_string().into_bytes()
            })
            .create_async()
            .await;

        let endpoint = engine::Endpoint {
            name: "chainlink".to_owned(),
            urls: vec![server.url()],
            ..engine::Endpoint::default()
        };
        let core = PollCore {
            base: ProviderBase::init(endpoint).unwrap(),
            pairs: RwLock::new(Vec::new()),
        };

        let ticker = core.query_feed("0xfeed").await.unwrap();
        mock.assert_async().await;
        assert_eq!(ticker.price, Decimal::new(314_159, 2));
    }
}
