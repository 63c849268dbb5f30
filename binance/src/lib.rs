pub mod config;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use engine::{
    Connector, CurrencyPair, Endpoint, FrameType, MessageHandler, PingType, ProviderBase,
    ProviderService, ServiceFactory, SubscribeCurrencyPairs, SubscribeHandler, TickerPrice,
    decimal::parse_decimal,
    websocket::{WebsocketConfig, WebsocketController},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use config::Config;

/// Direct-pair CEX websocket connector: subscribes to a combined ticker
/// stream and writes prices straight through (no inversion — every
/// subscribed symbol trades in the direction it was requested).
pub struct Provider {
    base: ProviderBase,
    ws: Arc<WebsocketController<TickerHandler>>,
}

#[async_trait]
impl Connector for Provider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn to_provider_symbol(&self, pair: &CurrencyPair) -> String {
        pair.join().to_lowercase()
    }
}

#[async_trait]
impl SubscribeCurrencyPairs for Provider {
    async fn subscribe_currency_pairs(self: Arc<Self>, pairs: &[CurrencyPair]) {
        let available = self.available_pairs().await;
        for pair in pairs {
            self.base
                .store
                .set_pairs(pair, available.as_deref(), |p| self.to_provider_symbol(p))
                .await;
        }
        self.ws.add_pairs(pairs).await;
    }
}

#[async_trait]
impl ProviderService for Provider {
    async fn start(&self, token: CancellationToken) -> anyhow::Result<()> {
        self.ws.clone().run(token).await;
        Ok(())
    }
}

#[async_trait]
impl ServiceFactory<dyn ProviderService> for Provider {
    type Config = (Endpoint, Config);

    async fn from_config(config: &Self::Config) -> anyhow::Result<Arc<dyn ProviderService>> {
        let (endpoint, cfg) = config.clone();
        let endpoint = engine::resolve_endpoint(endpoint)?;
        let base = ProviderBase::init(endpoint.clone())?;

        let ws_url = endpoint
            .websocket
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("binance connector requires a websocket endpoint"))?;
        let path = endpoint.websocket_path.as_deref().unwrap_or("/ws");
        let url = url::Url::parse(&format!("{}{}", ws_url.trim_end_matches('/'), path))?;

        let ws_config = WebsocketConfig {
            provider: endpoint.name.clone(),
            url,
            ping_duration: endpoint.ping_duration.unwrap_or(Duration::from_secs(20)),
            ping_type: endpoint.ping_type.unwrap_or(PingType::Ping),
            ping_message: endpoint
                .ping_message
                .clone()
                .unwrap_or_else(|| "ping".to_owned()),
            max_backoff: Duration::from_secs(64),
        };

        let handler = Arc::new(TickerHandler {
            store: base.store.clone(),
        });
        let ws = Arc::new(WebsocketController::new(
            ws_config,
            handler,
            Arc::new(SubscribeAll),
        ));

        let provider = Arc::new(Provider { base, ws });

        provider
            .clone()
            .subscribe_currency_pairs(
                &cfg.pairs.iter().map(CurrencyPair::from).collect::<Vec<_>>(),
            )
            .await;

        Ok(provider)
    }
}

struct SubscribeAll;

impl SubscribeHandler for SubscribeAll {
    fn subscribe_message(&self, pairs: &[CurrencyPair]) -> Vec<String> {
        let params: Vec<String> = pairs
            .iter()
            .map(|p| format!("{}@ticker", p.join().to_lowercase()))
            .collect();
        vec![
            serde_json::json!({
                "method": "SUBSCRIBE",
                "params": params,
                "id": 1,
            })
            .to_string(),
        ]
    }
}

#[derive(Deserialize)]
struct CombinedStream {
    data: TickerEvent,
}

#[derive(Deserialize)]
struct TickerEvent {
    s: String,
    c: String,
    v: String,
}

struct TickerHandler {
    store: Arc<engine::TickerStore>,
}

#[async_trait]
impl MessageHandler for TickerHandler {
    async fn handle_message(&self, _frame: FrameType, bytes: &[u8]) -> anyhow::Result<()> {
        let text = std::str::from_utf8(bytes)?;
        let parsed: CombinedStream = serde_json::from_str(text)
            .map_err(|e| anyhow::anyhow!("failed to decode ticker event: {e}"))?;

        let price = parse_decimal(&parsed.data.c, "price")?;
        let volume = parse_decimal(&parsed.data.v, "volume")?;

        if price <= Decimal::ZERO {
            debug!(symbol = %parsed.data.s, "dropping non-positive price ticker event");
            return Ok(());
        }

        let ticker = TickerPrice::new(price, volume, Utc::now());
        self.store
            .set_ticker_price(&parsed.data.s.to_lowercase(), ticker)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_message_lowercases_and_suffixes_ticker() {
        let pairs = vec![CurrencyPair::new("BTC", "USDT"), CurrencyPair::new("ETH", "USDT")];
        let messages = SubscribeAll.subscribe_message(&pairs);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("\"btcusdt@ticker\""));
        assert!(messages[0].contains("\"ethusdt@ticker\""));
        assert!(messages[0].contains("\"method\":\"SUBSCRIBE\""));
    }

    #[tokio::test]
    async fn handle_message_drops_zero_price() {
        let handler = TickerHandler {
            store: Arc::new(engine::TickerStore::new("binance")),
        };
        let pair = CurrencyPair::new("BTC", "USDT");
        handler.store.set_pairs(&pair, None, |p| p.join().to_lowercase()).await;

        let event = r#"{"data":{"s":"btcusdt","c":"0","v":"10"}}"#;
        handler.handle_message(FrameType::Text, event.as_bytes()).await.unwrap();

        let prices = handler.store.get_ticker_prices(&[pair]).await;
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn handle_message_drops_negative_price() {
        let handler = TickerHandler {
            store: Arc::new(engine::TickerStore::new("binance")),
        };
        let pair = CurrencyPair::new("BTC", "USDT");
        handler.store.set_pairs(&pair, None, |p| p.join().to_lowercase()).await;

        let event = r#"{"data":{"s":"btcusdt","c":"-5","v":"10"}}"#;
        handler.handle_message(FrameType::Text, event.as_bytes()).await.unwrap();

        let prices = handler.store.get_ticker_prices(&[pair]).await;
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn handle_message_records_nonzero_price() {
        let handler = TickerHandler {
            store: Arc::new(engine::TickerStore::new("binance")),
        };
        let pair = CurrencyPair::new("BTC", "USDT");
        handler.store.set_pairs(&pair, None, |p| p.join().to_lowercase()).await;

        let event = r#"{"data":{"s":"btcusdt","c":"50000.5","v":"12.3"}}"#;
        handler.handle_message(FrameType::Text, event.as_bytes()).await.unwrap();

        let prices = handler.store.get_ticker_prices(&[pair.clone()]).await;
        assert_eq!(prices.get(&pair).unwrap().price, parse_decimal("50000.5", "price").unwrap());
    }
}
