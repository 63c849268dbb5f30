pub mod connector;
pub mod decimal;
pub mod endpoint;
pub mod error;
pub mod http_client;
pub mod pair;
pub mod polling;
pub mod provider;
pub mod runtime;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod volume;
pub mod websocket;

pub use connector::{Connector, SubscribeCurrencyPairs};
pub use endpoint::{Endpoint, ProviderName, resolve as resolve_endpoint};
pub use error::{ProviderError, Result};
pub use pair::{CurrencyPair, TickerPrice};
pub use polling::PollingDriver;
pub use provider::{ProviderBase, ProviderService};
pub use service::{
    builder::{build_processes, build_providers},
    factory::ServiceFactory,
};
pub use store::TickerStore;
pub use telemetry::{METRICS, Telemetry};
pub use volume::{InMemoryVolumeAccumulator, VolumeAccumulator};
pub use websocket::{
    ConnectionState, FrameType, MessageHandler, PingType, SubscribeHandler, WebsocketController,
};
