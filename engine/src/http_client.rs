use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use reqwest::{Client, StatusCode, redirect::Policy};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ProviderError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client with failover across a list of candidate base URLs.
///
/// Every request starts at the current primary and, on failure, rotates
/// through the remaining URLs starting one past the current primary
/// (wrapping around), promoting the first URL that succeeds to primary for
/// subsequent requests. No redirects are followed — a redirect response is
/// treated as a non-success status. An empty response body is treated as a
/// failure even on a 2xx status, since every endpoint this client talks to
/// is expected to return a non-empty payload.
pub struct FailoverClient {
    client: Client,
    urls: Vec<Url>,
    primary: AtomicUsize,
}

impl FailoverClient {
    pub fn new(urls: Vec<Url>) -> Result<Self> {
        if urls.is_empty() {
            return Err(ProviderError::Config {
                provider: "http_client".to_owned(),
                reason: "no URLs configured".to_owned(),
            });
        }

        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Config {
                provider: "http_client".to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            urls,
            primary: AtomicUsize::new(0),
        })
    }

    /// Issues a GET request against `path` appended to each candidate base
    /// URL in rotation order, returning the first non-empty successful
    /// response body.
    pub async fn get(&self, path: &str) -> Result<String> {
        let len = self.urls.len();
        let start = self.primary.load(Ordering::Relaxed);

        let mut last_err = None;
        for offset in 0..len {
            let idx = (start + offset) % len;
            let base = &self.urls[idx];

            let url = match base.join(path) {
                Ok(u) => u,
                Err(e) => {
                    last_err = Some(ProviderError::Http {
                        url: base.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.try_once(&url).await {
                Ok(body) => {
                    if idx != start {
                        self.primary.store(idx, Ordering::Relaxed);
                        debug!(%url, "promoted url to primary after failover");
                    }
                    return Ok(body);
                }
                Err(e) => {
                    warn!(%url, error = %e, "request failed, trying next url");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(ProviderError::Config {
            provider: "http_client".to_owned(),
            reason: "no urls configured".to_owned(),
        }))
    }

    /// Issues a JSON POST against `path` appended to each candidate base URL,
    /// in the same rotation/promote-on-success order as [`Self::get`]. Used
    /// by connectors that speak JSON-RPC (e.g. `eth_call`) rather than REST.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<String> {
        let len = self.urls.len();
        let start = self.primary.load(Ordering::Relaxed);

        let mut last_err = None;
        for offset in 0..len {
            let idx = (start + offset) % len;
            let base = &self.urls[idx];

            let url = match base.join(path) {
                Ok(u) => u,
                Err(e) => {
                    last_err = Some(ProviderError::Http {
                        url: base.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.try_once_post(&url, body).await {
                Ok(text) => {
                    if idx != start {
                        self.primary.store(idx, Ordering::Relaxed);
                        debug!(%url, "promoted url to primary after failover");
                    }
                    return Ok(text);
                }
                Err(e) => {
                    warn!(%url, error = %e, "request failed, trying next url");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(ProviderError::Config {
            provider: "http_client".to_owned(),
            reason: "no urls configured".to_owned(),
        }))
    }

    async fn try_once_post(&self, url: &Url, body: &serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Self::check_response(url, response).await
    }

    async fn try_once(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Self::check_response(url, response).await
    }

    async fn check_response(url: &Url, response: reqwest::Response) -> Result<String> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            warn!(%url, %status, retry_after, "upstream rate-limited this request");
            return Err(ProviderError::UpstreamTransient {
                provider: url.to_string(),
                reason: format!("rate limited, retry-after={retry_after}"),
            });
        }

        if !status.is_success() {
            return Err(ProviderError::UpstreamTransient {
                provider: url.to_string(),
                reason: format!("status {status}"),
            });
        }

        let body = response.text().await.map_err(|e| ProviderError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if body.is_empty() {
            return Err(ProviderError::UpstreamTransient {
                provider: url.to_string(),
                reason: "empty response body".to_owned(),
            });
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_url_list() {
        let result = FailoverClient::new(vec![]);
        assert!(result.is_err());
    }
}
