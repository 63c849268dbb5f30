use thiserror::Error;

/// Closed set of failure modes a provider can hit.
///
/// `ConfigError` is the only variant that aborts construction
/// (`ServiceFactory::from_config` returns `Err`); every other variant is
/// logged and absorbed at the call site named in its doc comment.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level HTTP failure: connection refused, TLS error, timeout,
    /// a malformed URL, or a non-2xx status after failover has been
    /// exhausted. Logged by the polling driver and by the websocket
    /// controller's subscribe path.
    #[error("http request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// A websocket or HTTP payload could not be deserialized into the
    /// shape a connector expects. Never closes a websocket connection.
    #[error("failed to decode message from {provider}: {reason}")]
    Decode { provider: String, reason: String },

    /// A well-formed payload carried a value this runtime could not parse
    /// (a non-numeric price string, an unrecognized denom, ...).
    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// The `Endpoint` resolved for a provider is unusable (no URLs, a
    /// websocket path with no websocket URL, etc). Fatal at startup.
    #[error("invalid endpoint configuration for {provider}: {reason}")]
    Config { provider: String, reason: String },

    /// An upstream returned a retryable condition (429, 5xx, empty body).
    /// Callers retry or fail over; this is never surfaced to `GetTickerPrices`.
    #[error("upstream {provider} returned a transient error: {reason}")]
    UpstreamTransient { provider: String, reason: String },

    /// The task's `CancellationToken` fired. Propagated up to the process
    /// supervisor, never logged as an error.
    #[error("operation cancelled")]
    ContextCancelled,
}

pub type Result<T> = std::result::Result<T, ProviderError>;
