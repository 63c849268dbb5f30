use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tools::http::http_server::HttpServerProcess;
use tracing::error;

use crate::provider::ProviderService;

/// Adapts a [`ProviderService`] to the [`HttpServerProcess`] supervisor
/// contract: restarts `service.start` after a cooldown if it returns an
/// error, and stops cleanly once `token` is cancelled.
pub struct GenericProcess<S>
where
    S: ProviderService + ?Sized,
{
    error_timeout: Duration,
    service: Arc<S>,
}

impl<S: ProviderService + ?Sized + 'static> GenericProcess<S> {
    #[must_use]
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            error_timeout: Duration::from_secs(60),
        }
    }
}

#[async_trait]
impl<S: ProviderService + ?Sized + 'static> HttpServerProcess for GenericProcess<S> {
    async fn pre_run(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&self, token: CancellationToken) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                result = self.service.start(token.child_token()) => {
                    if let Err(e) = result {
                        error!(error = ?e, "error running provider");
                        tokio::time::sleep(self.error_timeout).await;
                    }
                }
            }
        }
        Ok(())
    }
}
