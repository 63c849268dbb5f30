use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    connector::Connector,
    telemetry::{METRICS, Telemetry},
};

/// Drives `connector.poll()` on a fixed interval until `token` is cancelled.
/// A poll error is logged and counted, never fatal to the loop; the next
/// tick runs regardless. Cancellation is observed immediately rather than
/// waiting out the remainder of the current interval.
pub struct PollingDriver<C: Connector> {
    connector: Arc<C>,
    interval: Duration,
}

impl<C: Connector + 'static> PollingDriver<C> {
    #[must_use]
    pub fn new(connector: Arc<C>, interval: Duration) -> Self {
        Self { connector, interval }
    }

    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                () = token.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(e) = self.connector.poll().await {
                        error!(error = %e, "poll cycle failed");
                        METRICS.counter(
                            "provider_poll_errors_total",
                            &[("provider", self.connector.base().endpoint.name.clone())],
                            1,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{endpoint::Endpoint, pair::CurrencyPair, provider::ProviderBase};

    struct CountingConnector {
        base: ProviderBase,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        fn base(&self) -> &ProviderBase {
            &self.base
        }

        fn to_provider_symbol(&self, pair: &CurrencyPair) -> String {
            pair.join()
        }

        async fn poll(&self) -> crate::error::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_promptly_on_cancellation() {
        let endpoint = Endpoint {
            name: "test".to_owned(),
            urls: vec!["https://example.invalid".to_owned()],
            ..Endpoint::default()
        };
        let connector = Arc::new(CountingConnector {
            base: ProviderBase::init(endpoint).unwrap(),
            calls: AtomicUsize::new(0),
        });

        let driver = PollingDriver::new(connector.clone(), Duration::from_secs(3600));
        let token = CancellationToken::new();
        token.cancel();

        driver.run(token).await;
        assert_eq!(connector.calls.load(Ordering::SeqCst), 0);
    }
}
