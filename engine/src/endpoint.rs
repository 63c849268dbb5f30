use std::{collections::HashMap, time::Duration};

use rand::seq::SliceRandom;

use crate::{
    error::{ProviderError, Result},
    websocket::PingType,
};

/// Per-provider connection settings. Every field a connector does not
/// explicitly set is filled in from that provider's built-in defaults by
/// [`resolve`]; there is no file-based configuration layer here (programmatic
/// overrides only).
#[derive(Debug, Clone, Default)]
pub struct Endpoint {
    pub name: String,
    pub urls: Vec<String>,
    pub websocket: Option<String>,
    pub websocket_path: Option<String>,
    pub poll_interval: Option<Duration>,
    pub ping_duration: Option<Duration>,
    pub ping_type: Option<PingType>,
    pub ping_message: Option<String>,
    pub contract_addresses: HashMap<String, String>,
    pub volume_blocks: Option<u32>,
    pub volume_pause: Option<Duration>,
    /// Fixed-point scale per symbol, for providers whose feeds vary in
    /// decimals pair by pair (a multi-feed chainlink or osmosis config).
    pub decimals: HashMap<String, u32>,
    /// Per-symbol polling/aggregation periods, for providers that need more
    /// than one cadence across their configured symbols.
    pub periods: HashMap<String, Vec<Duration>>,
}

/// Closed enumeration of the providers this workspace ships built-in
/// endpoint defaults for. `as_str` is the key [`defaults`] matches on;
/// anything outside this enum still works through [`resolve`], it just
/// gets no defaults merged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ProviderName {
    Binance,
    KucoinInverse,
    OsmosisDex,
    StrideRedemption,
    ChainlinkEvm,
}

impl ProviderName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::KucoinInverse => "kucoin",
            Self::OsmosisDex => "osmosis",
            Self::StrideRedemption => "stride",
            Self::ChainlinkEvm => "chainlink",
        }
    }
}

/// The fixed defaults table for built-in providers. Unknown names resolve
/// to `None`: the user-supplied `Endpoint` is then used completely as-is,
/// with no defaults merged in.
#[must_use]
pub fn defaults(name: &str) -> Option<Endpoint> {
    match name {
        "binance" => Some(Endpoint {
            name: "binance".to_owned(),
            urls: vec!["https://api.binance.com".to_owned()],
            websocket: Some("wss://stream.binance.com:9443".to_owned()),
            websocket_path: Some("/ws".to_owned()),
            ping_duration: Some(Duration::from_secs(20)),
            ping_type: Some(PingType::Ping),
            ping_message: None,
            ..Endpoint::default()
        }),
        "kucoin" => Some(Endpoint {
            name: "kucoin".to_owned(),
            urls: vec!["https://api.kucoin.com".to_owned()],
            ping_duration: Some(Duration::from_secs(18)),
            ping_type: Some(PingType::Text),
            ping_message: Some("ping".to_owned()),
            ..Endpoint::default()
        }),
        "osmosis" => Some(Endpoint {
            name: "osmosis".to_owned(),
            urls: vec![
                "https://lcd.osmosis.zone".to_owned(),
                "https://osmosis-api.polkachu.com".to_owned(),
            ],
            poll_interval: Some(Duration::from_secs(10)),
            ..Endpoint::default()
        }),
        "stride" => Some(Endpoint {
            name: "stride".to_owned(),
            urls: vec!["https://stride-api.polkachu.com".to_owned()],
            poll_interval: Some(Duration::from_secs(30)),
            ..Endpoint::default()
        }),
        "chainlink" => Some(Endpoint {
            name: "chainlink".to_owned(),
            urls: vec!["https://eth.llamarpc.com".to_owned()],
            poll_interval: Some(Duration::from_secs(15)),
            ..Endpoint::default()
        }),
        _ => None,
    }
}

/// Merges a user-supplied `Endpoint` over the built-in defaults for
/// `user.name`, field by field — every `Some`/non-empty field on `user`
/// wins, every field `user` leaves empty falls back to the default. If
/// `user.name` has no built-in defaults, `user` is returned unchanged.
///
/// Special cases:
/// - `urls` is shuffled (a fresh RNG per call, never a process-global one)
///   whenever it was *not* explicitly overridden by the user, so repeated
///   resolutions don't all start failover at the same URL.
/// - `websocket` only falls back to the default if the default itself
///   defines one; a provider with no default websocket never gets one
///   invented for it.
/// - `ping_message` falls back `user > default > "ping"` — every provider
///   ends up with *some* ping message even if neither side set one.
/// - `contract_addresses` is the union of both maps, user entries winning
///   on key collision.
pub fn resolve(user: Endpoint) -> Result<Endpoint> {
    let default = defaults(&user.name);

    let Some(default) = default else {
        return finalize(user);
    };

    let mut urls = if user.urls.is_empty() {
        default.urls.clone()
    } else {
        user.urls.clone()
    };
    if user.urls.is_empty() {
        urls.shuffle(&mut rand::rng());
    }

    let websocket = user.websocket.or(default.websocket.clone());

    let mut contract_addresses = default.contract_addresses.clone();
    contract_addresses.extend(user.contract_addresses.clone());

    let mut decimals = default.decimals.clone();
    decimals.extend(user.decimals.clone());

    let mut periods = default.periods.clone();
    periods.extend(user.periods.clone());

    let ping_message = user
        .ping_message
        .or(default.ping_message.clone())
        .or(Some("ping".to_owned()));

    let merged = Endpoint {
        name: user.name,
        urls,
        websocket,
        websocket_path: user.websocket_path.or(default.websocket_path.clone()),
        poll_interval: user.poll_interval.or(default.poll_interval),
        ping_duration: user.ping_duration.or(default.ping_duration),
        ping_type: user.ping_type.or(default.ping_type),
        ping_message,
        contract_addresses,
        volume_blocks: user.volume_blocks.or(default.volume_blocks),
        volume_pause: user.volume_pause.or(default.volume_pause),
        decimals,
        periods,
    };

    finalize(merged)
}

fn finalize(endpoint: Endpoint) -> Result<Endpoint> {
    if endpoint.urls.is_empty() {
        return Err(ProviderError::Config {
            provider: endpoint.name,
            reason: "no urls resolved".to_owned(),
        });
    }

    if endpoint.websocket_path.is_some() && endpoint.websocket.is_none() {
        return Err(ProviderError::Config {
            provider: endpoint.name,
            reason: "websocket_path set with no websocket url".to_owned(),
        });
    }

    Ok(endpoint)
}
