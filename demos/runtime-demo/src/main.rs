use std::time::Duration;

use engine::{Connector, CurrencyPair, Endpoint, ServiceFactory, build_processes, build_providers};
use tools::http::http_server::{HttpServer, HttpServerConfig};

/// Fixed smoke-test wiring for two of the five connectors: `binance` (a
/// direct-pair CEX websocket feed) and `osmosis` (an on-chain DEX pool
/// poller). No business configuration is read from argv or a config file —
/// this is ambient scaffolding to exercise the runtime end to end, not a CLI.
#[tools::main]
async fn main() -> anyhow::Result<()> {
    let binance_config = (
        Endpoint {
            name: "binance".to_owned(),
            ..Endpoint::default()
        },
        binance::Config {
            pairs: vec![binance::config::PairConfig {
                base: "BTC".to_owned(),
                quote: "USDT".to_owned(),
            }],
        },
    );

    let osmosis_config = (
        Endpoint {
            name: "osmosis".to_owned(),
            ..Endpoint::default()
        },
        osmosis::Config {
            pools: vec![osmosis::config::PoolConfig {
                base: "OSMO".to_owned(),
                quote: "ATOM".to_owned(),
                contract_address: "osmo1demo0000000000000000000000000000000000000".to_owned(),
            }],
        },
    );

    let binance_providers =
        build_providers::<binance::Provider, _>(std::slice::from_ref(&binance_config)).await?;
    let osmosis_providers =
        build_providers::<osmosis::Provider, _>(std::slice::from_ref(&osmosis_config)).await?;

    let watched_pairs = vec![
        CurrencyPair::new("BTC", "USDT"),
        CurrencyPair::new("OSMO", "ATOM"),
    ];

    let printer_providers = binance_providers
        .iter()
        .chain(osmosis_providers.iter())
        .cloned()
        .collect::<Vec<_>>();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            for provider in &printer_providers {
                let prices = provider.base().store.get_ticker_prices(&watched_pairs).await;
                for (pair, price) in prices {
                    tracing::info!(%pair, price = %price.price, volume = %price.volume, "ticker");
                }
            }
        }
    });

    let mut providers = binance_providers;
    providers.extend(osmosis_providers);
    let processes = build_processes(providers);

    HttpServer::from_config(HttpServerConfig {
        addr: "0.0.0.0:8080".to_owned(),
        metrics_addr: "0.0.0.0:9090".to_owned(),
    })
    .with_processes(processes)
    .run()
    .await
}
