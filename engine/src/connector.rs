use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::Result, pair::CurrencyPair, provider::ProviderBase};

/// The hooks a venue-specific connector must supply. The runtime owns
/// everything else: endpoint resolution, the HTTP client, the websocket
/// controller, the polling driver, and the ticker store.
///
/// Message shapes for individual venues (how a ticker update is framed in
/// JSON, what a subscribe ack looks like, ...) are deliberately not part of
/// this contract — they live entirely inside each connector's
/// implementation of `message_handler`/`subscribe_handler`/`poll`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Runtime plumbing shared by every provider: resolved endpoint, ticker
    /// store, HTTP client, contract map.
    fn base(&self) -> &ProviderBase;

    /// Maps a runtime `CurrencyPair` to the symbol string this venue's API
    /// expects (e.g. `BTCUSDT`, `btc-usdt`, a contract address).
    fn to_provider_symbol(&self, pair: &CurrencyPair) -> String;

    /// Enumerates the provider symbols this venue currently lists, for
    /// connectors built against a venue-side enumeration endpoint (e.g. an
    /// exchange-info REST call). `None` means no such endpoint exists, in
    /// which case [`crate::store::TickerStore::set_pairs`] registers both
    /// the direct and inverse provider symbol speculatively.
    async fn available_pairs(&self) -> Option<Vec<String>> {
        None
    }

    /// One polling cycle for venues driven by [`crate::polling::PollingDriver`]
    /// rather than a websocket. Returning `Err` is logged and does not stop
    /// the driver; the next tick runs regardless.
    async fn poll(&self) -> Result<()> {
        Ok(())
    }
}

/// Registers `pairs` with a connector: builds the bidirectional provider
/// symbol map in the shared store and, for websocket-driven connectors,
/// notifies the controller so it can (re)subscribe.
#[async_trait]
pub trait SubscribeCurrencyPairs: Connector {
    async fn subscribe_currency_pairs(self: Arc<Self>, pairs: &[CurrencyPair]);
}
