use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    connector::Connector, endpoint::Endpoint, error::Result, http_client::FailoverClient,
    store::TickerStore,
};

/// Shared state every connector is built from: the resolved endpoint, the
/// failover HTTP client built from its URLs (trailing slashes trimmed so
/// path-joining never produces a double slash), and the ticker store the
/// connector's hooks write into.
///
/// `store` is behind an `Arc` so a websocket message handler can hold its
/// own clone of just the store, without needing a reference back to the
/// whole provider (and the construction-order cycle that would imply).
pub struct ProviderBase {
    pub endpoint: Endpoint,
    pub http: FailoverClient,
    pub store: Arc<TickerStore>,
}

impl ProviderBase {
    pub fn init(endpoint: Endpoint) -> Result<Self> {
        let urls = endpoint
            .urls
            .iter()
            .map(|u| u.trim_end_matches('/'))
            .map(url::Url::parse)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| crate::error::ProviderError::Config {
                provider: endpoint.name.clone(),
                reason: e.to_string(),
            })?;

        let http = FailoverClient::new(urls)?;
        let store = Arc::new(TickerStore::new(endpoint.name.clone()));

        Ok(Self {
            endpoint,
            http,
            store,
        })
    }
}

/// The lifecycle every provider exposes to the runtime supervisor,
/// independent of whether it is backed by a websocket controller or a
/// polling driver underneath. Constructed via
/// [`crate::service::factory::ServiceFactory`], the same factory-trait
/// pattern used elsewhere in this workspace.
///
/// A supertrait of [`Connector`] rather than a bare lifecycle, so that code
/// holding only `Arc<dyn ProviderService>` (a supervisor, or a demo binary)
/// can still reach `base().store` to read out prices, without needing the
/// connector's concrete type.
#[async_trait]
pub trait ProviderService: Connector {
    /// Runs the provider's long-lived task(s) until `token` is cancelled.
    async fn start(&self, token: CancellationToken) -> anyhow::Result<()>;
}
