use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{
    net::TcpStream,
    sync::{Mutex, RwLock},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::Message as WsMessage,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{pair::CurrencyPair, telemetry::METRICS};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// The shape a connector's keep-alive frame takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingType {
    /// A protocol-level WebSocket ping frame.
    Ping,
    /// A text frame carrying `ping_message` verbatim.
    Text,
    /// A binary frame carrying `ping_message`'s bytes.
    Binary,
}

/// How an inbound frame was classified before being handed to the
/// connector's [`MessageHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Text,
    Binary,
}

impl FrameType {
    fn as_label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

/// Lifecycle state of a [`WebsocketController`]'s connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Dialing,
    Open,
    Subscribing,
    Subscribed,
    Closing,
    Closed,
}

/// Receives decoded frames off the socket, classified by [`FrameType`] so a
/// connector can act on binary-framed ticker data as well as text. Returning
/// `Err` logs and continues — a decode failure never tears down the
/// connection.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, frame: FrameType, bytes: &[u8]) -> anyhow::Result<()>;
}

/// Builds the outbound subscribe payload(s) for a set of pairs. Called once
/// per connect (or reconnect) with the full set of pairs subscribed so far,
/// and again every time `subscribe_currency_pairs` adds new pairs — the
/// controller always replays the *entire* known pair list rather than
/// sending an incremental diff, so a reconnect never needs separate
/// bookkeeping for "what did the old connection already know."
///
/// Returns one or more messages, sent in order: some venues require a
/// separate subscribe frame per pair or per batch rather than a single
/// frame naming every pair at once.
pub trait SubscribeHandler: Send + Sync {
    fn subscribe_message(&self, pairs: &[CurrencyPair]) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct WebsocketConfig {
    pub provider: String,
    pub url: Url,
    pub ping_duration: Duration,
    pub ping_type: PingType,
    pub ping_message: String,
    pub max_backoff: Duration,
}

/// Owns one websocket connection's lifecycle: dial, subscribe, read loop,
/// ping scheduling, and reconnect with exponential backoff. Generalizes the
/// per-venue reconnect loop every CEX connector would otherwise hand-roll.
pub struct WebsocketController<H: MessageHandler> {
    config: WebsocketConfig,
    handler: Arc<H>,
    subscriber: Arc<dyn SubscribeHandler>,
    writer: Mutex<Option<WsSink>>,
    state: RwLock<ConnectionState>,
    subscribed_pairs: RwLock<Vec<CurrencyPair>>,
}

impl<H: MessageHandler + 'static> WebsocketController<H> {
    #[must_use]
    pub fn new(
        config: WebsocketConfig,
        handler: Arc<H>,
        subscriber: Arc<dyn SubscribeHandler>,
    ) -> Self {
        Self {
            config,
            handler,
            subscriber,
            writer: Mutex::new(None),
            state: RwLock::new(ConnectionState::Closed),
            subscribed_pairs: RwLock::new(Vec::new()),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Adds `pairs` to the subscribed set and, if the connection is already
    /// open, replays a fresh subscribe message for the full set.
    pub async fn add_pairs(&self, pairs: &[CurrencyPair]) {
        {
            let mut subscribed = self.subscribed_pairs.write().await;
            for pair in pairs {
                if !subscribed.contains(pair) {
                    subscribed.push(pair.clone());
                }
            }
        }

        if self.state().await == ConnectionState::Subscribed {
            self.resubscribe().await;
        }
    }

    async fn resubscribe(&self) {
        *self.state.write().await = ConnectionState::Subscribing;
        let pairs = self.subscribed_pairs.read().await.clone();
        let messages = self.subscriber.subscribe_message(&pairs);

        let mut writer = self.writer.lock().await;
        if let Some(sink) = writer.as_mut() {
            for message in messages {
                if let Err(e) = sink.send(WsMessage::Text(message.into())).await {
                    warn!(error = %e, "failed to send subscribe message");
                    return;
                }
            }
        }
        drop(writer);
        *self.state.write().await = ConnectionState::Subscribed;
    }

    /// Runs the connect/read/ping loop until `token` is cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                break;
            }

            self.connect_and_serve(&token).await;

            if token.is_cancelled() {
                break;
            }
        }

        *self.state.write().await = ConnectionState::Closed;
    }

    async fn connect_and_serve(&self, token: &CancellationToken) {
        *self.state.write().await = ConnectionState::Dialing;

        let stream = match self.dial_with_backoff(token).await {
            Some(stream) => stream,
            None => return, // cancelled while dialing
        };

        *self.state.write().await = ConnectionState::Open;

        let (sink, mut read) = stream.split();
        *self.writer.lock().await = Some(sink);

        self.resubscribe().await;

        let mut ping_interval = tokio::time::interval(self.config.ping_duration);
        ping_interval.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    *self.state.write().await = ConnectionState::Closing;
                    self.close().await;
                    return;
                }
                _ = ping_interval.tick() => {
                    self.send_ping().await;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            METRICS.counter(
                                "provider_message",
                                &[("provider", self.config.provider.clone()), ("type", FrameType::Text.as_label().to_owned())],
                                1,
                            );
                            if let Err(e) = self.handler.handle_message(FrameType::Text, text.as_bytes()).await {
                                debug!(error = %e, "failed to decode message, connection kept open");
                            }
                        }
                        Some(Ok(WsMessage::Binary(bytes))) => {
                            METRICS.counter(
                                "provider_message",
                                &[("provider", self.config.provider.clone()), ("type", FrameType::Binary.as_label().to_owned())],
                                1,
                            );
                            if let Err(e) = self.handler.handle_message(FrameType::Binary, &bytes).await {
                                debug!(error = %e, "failed to decode message, connection kept open");
                            }
                        }
                        Some(Ok(WsMessage::Ping(data))) => {
                            let mut writer = self.writer.lock().await;
                            if let Some(sink) = writer.as_mut() {
                                let _ = sink.send(WsMessage::Pong(data)).await;
                            }
                        }
                        Some(Ok(WsMessage::Pong(_))) => {}
                        Some(Ok(WsMessage::Close(_))) | None => {
                            info!("websocket closed by peer, reconnecting");
                            return;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "websocket read error, reconnecting");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn send_ping(&self) {
        let message = match self.config.ping_type {
            PingType::Ping => WsMessage::Ping(Vec::new().into()),
            PingType::Text => WsMessage::Text(self.config.ping_message.clone().into()),
            PingType::Binary => WsMessage::Binary(self.config.ping_message.clone().into_bytes().into()),
        };

        let mut writer = self.writer.lock().await;
        if let Some(sink) = writer.as_mut() {
            if let Err(e) = sink.send(message).await {
                warn!(error = %e, "failed to send ping");
            }
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Some(sink) = writer.as_mut() {
            let _ = sink.send(WsMessage::Close(None)).await;
        }
        *writer = None;
    }

    /// Dials with exponential backoff (1s doubling, capped at
    /// `config.max_backoff`), returning `None` only if cancelled mid-wait.
    async fn dial_with_backoff(
        &self,
        token: &CancellationToken,
    ) -> Option<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let mut backoff = Duration::from_secs(1);

        loop {
            tokio::select! {
                () = token.cancelled() => return None,
                result = connect_async(self.config.url.as_str()) => {
                    match result {
                        Ok((stream, _)) => return Some(stream),
                        Err(e) => {
                            error!(url = %self.config.url, error = %e, backoff_secs = backoff.as_secs(), "failed to dial websocket, retrying");
                        }
                    }
                }
            }

            tokio::select! {
                () = token.cancelled() => return None,
                () = tokio::time::sleep(backoff) => {}
            }

            if backoff < self.config.max_backoff {
                backoff = (backoff * 2).min(self.config.max_backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl MessageHandler for NoopHandler {
        async fn handle_message(&self, _frame: FrameType, _bytes: &[u8]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NoopSubscriber;

    impl SubscribeHandler for NoopSubscriber {
        fn subscribe_message(&self, pairs: &[CurrencyPair]) -> Vec<String> {
            vec![format!("subscribe:{}", pairs.len())]
        }
    }

    #[tokio::test]
    async fn starts_closed_and_tracks_added_pairs() {
        let controller = WebsocketController::new(
            WebsocketConfig {
                provider: "test".to_owned(),
                url: Url::parse("wss://example.invalid/ws").unwrap(),
                ping_duration: Duration::from_secs(30),
                ping_type: PingType::Ping,
                ping_message: "ping".to_owned(),
                max_backoff: Duration::from_secs(64),
            },
            Arc::new(NoopHandler),
            Arc::new(NoopSubscriber),
        );

        assert_eq!(controller.state().await, ConnectionState::Closed);

        controller
            .add_pairs(&[CurrencyPair::new("BTC", "USDT")])
            .await;
        assert_eq!(controller.subscribed_pairs.read().await.len(), 1);

        // Adding the same pair twice does not duplicate it.
        controller
            .add_pairs(&[CurrencyPair::new("BTC", "USDT")])
            .await;
        assert_eq!(controller.subscribed_pairs.read().await.len(), 1);
    }
}
