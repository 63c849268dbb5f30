use std::sync::Arc;

use tools::http::http_server::HttpServerProcess;

use crate::{provider::ProviderService, runtime::process::GenericProcess, service::factory::ServiceFactory};

/// Builds one provider per `(config)` entry via `P::from_config`.
pub async fn build_providers<P, C>(configs: &[C]) -> anyhow::Result<Vec<Arc<dyn ProviderService>>>
where
    P: ServiceFactory<dyn ProviderService, Config = C>,
{
    let mut providers = Vec::with_capacity(configs.len());
    for config in configs {
        providers.push(P::from_config(config).await?);
    }
    Ok(providers)
}

/// Wraps each provider in a [`GenericProcess`] so the HTTP server can
/// supervise it alongside the app/metrics listeners.
#[must_use]
pub fn build_processes(providers: Vec<Arc<dyn ProviderService>>) -> Vec<Arc<dyn HttpServerProcess>> {
    providers
        .into_iter()
        .map(|p| Arc::new(GenericProcess::new(p)) as Arc<dyn HttpServerProcess>)
        .collect()
}
