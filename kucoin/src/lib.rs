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

/// Inverse-pair CEX websocket connector: the venue only lists pairs in one
/// direction, so every requested pair is registered (and priced) through
/// [`engine::store::TickerStore`]'s inverse slot rather than its direct one.
pub struct Provider {
    base: ProviderBase,
    ws: Arc<WebsocketController<TickerHandler>>,
}

#[async_trait]
impl Connector for Provider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    /// The venue's own listing direction, independent of which way the
    /// caller asked for the pair — KuCoin lists `BTC-USDT`, never
    /// `USDT-BTC`, so this always dashes `base-quote` in listing order.
    fn to_provider_symbol(&self, pair: &CurrencyPair) -> String {
        format!("{}-{}", pair.base, pair.quote)
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
            .ok_or_else(|| anyhow::anyhow!("kucoin connector requires a websocket endpoint"))?;
        let path = endpoint.websocket_path.as_deref().unwrap_or("/");
        let url = url::Url::parse(&format!("{}{}", ws_url.trim_end_matches('/'), path))?;

        let ws_config = WebsocketConfig {
            provider: endpoint.name.clone(),
            url,
            ping_duration: endpoint.ping_duration.unwrap_or(Duration::from_secs(18)),
            ping_type: endpoint.ping_type.unwrap_or(PingType::Text),
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
        let topics: Vec<String> = pairs
            .iter()
            .map(|p| format!("{}-{}", p.base, p.quote))
            .collect();
        vec![
            serde_json::json!({
                "id": 1,
                "type": "subscribe",
                "topic": format!("/market/ticker:{}", topics.join(",")),
                "privateChannel": false,
                "response": true,
            })
            .to_string(),
        ]
    }
}

#[derive(Deserialize)]
struct TickerEvent {
    topic: String,
    data: TickerData,
}

#[derive(Deserialize)]
struct TickerData {
    price: String,
    size: String,
}

struct TickerHandler {
    store: Arc<engine::TickerStore>,
}

#[async_trait]
impl MessageHandler for TickerHandler {
    async fn handle_message(&self, _frame: FrameType, bytes: &[u8]) -> anyhow::Result<()> {
        let text = std::str::from_utf8(bytes)?;
        let event: TickerEvent = serde_json::from_str(text)
            .map_err(|e| anyhow::anyhow!("failed to decode ticker event: {e}"))?;

        let Some(symbol) = event.topic.strip_prefix("/market/ticker:") else {
            // Welcome/ack/pong control frames carry no `/market/ticker:` topic.
            return Ok(());
        };

        let price = parse_decimal(&event.data.price, "price")?;
        let volume = parse_decimal(&event.data.size, "volume")?;

        if price <= Decimal::ZERO {
            debug!(symbol, "dropping non-positive price ticker event");
            return Ok(());
        }

        let ticker = TickerPrice::new(price, volume, Utc::now());
        self.store.set_ticker_price(symbol, ticker).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_message_always_uses_listing_order() {
        let pairs = vec![CurrencyPair::new("USDT", "BTC")];
        let messages = SubscribeAll.subscribe_message(&pairs);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("/market/ticker:BTC-USDT"));
    }

    #[tokio::test]
    async fn handle_message_ignores_non_ticker_topics() {
        let handler = TickerHandler {
            store: Arc::new(engine::TickerStore::new("kucoin")),
        };
        let snapshot = r#"{"topic":"/market/snapshot:BTC-USDT","data":{"price":"1","size":"1"}}"#;
        assert!(handler.handle_message(FrameType::Text, snapshot.as_bytes()).await.is_ok());
    }

    #[tokio::test]
    async fn handle_message_strips_topic_prefix_and_records_price() {
        let handler = TickerHandler {
            store: Arc::new(engine::TickerStore::new("kucoin")),
        };
        let pair = CurrencyPair::new("BTC", "USDT");
        handler
            .store
            .set_pairs(&pair, None, |p| format!("{}-{}", p.base, p.quote))
            .await;

        let event = r#"{"topic":"/market/ticker:BTC-USDT","data":{"price":"50000.5","size":"1.2"}}"#;
        handler.handle_message(FrameType::Text, event.as_bytes()).await.unwrap();

        let prices = handler.store.get_ticker_prices(&[pair.clone()]).await;
        assert_eq!(prices.get(&pair).unwrap().price, parse_decimal("50000.5", "price").unwrap());
    }

    #[tokio::test]
    async fn handle_message_drops_negative_price() {
        let handler = TickerHandler {
            store: Arc::new(engine::TickerStore::new("kucoin")),
        };
        let pair = CurrencyPair::new("BTC", "USDT");
        handler
            .store
            .set_pairs(&pair, None, |p| format!("{}-{}", p.base, p.quote))
            .await;

        let event = r#"{"topic":"/market/ticker:BTC-USDT","data":{"price":"-50000.5","size":"1.2"}}"#;
        handler.handle_message(FrameType::Text, event.as_bytes()).await.unwrap();

        let prices = handler.store.get_ticker_prices(&[pair.clone()]).await;
        assert!(prices.is_empty());
    }
}
