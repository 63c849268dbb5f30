use std::{fmt::Display, future::ready, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{signal, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A background task supervised by `HttpServer`.
///
/// `pre_run` runs once, before either HTTP listener binds, and may fail the
/// whole server startup. `run` is the long-lived task body; it receives a
/// token that is cancelled once both servers have shut down and should
/// return promptly afterward.
#[async_trait]
pub trait HttpServerProcess: Send + Sync + 'static {
    async fn pre_run(&self) -> Result<()>;
    async fn run(&self, token: CancellationToken) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpServerConfig {
    pub addr: String,
    pub metrics_addr: String,
}

#[derive(Default)]
pub struct HttpServer {
    addr: String,
    metrics_addr: String,
    pre_run_tasks_timeout: Duration,
    processes: Option<Vec<Arc<dyn HttpServerProcess>>>,
}

impl HttpServer {
    pub fn from_config(config: HttpServerConfig) -> Self {
        Self {
            addr: config.addr,
            metrics_addr: config.metrics_addr,
            pre_run_tasks_timeout: Duration::from_secs(60),
            processes: None,
        }
    }

    #[must_use]
    pub fn with_processes(mut self, processes: Vec<Arc<dyn HttpServerProcess>>) -> Self {
        self.processes = Some(processes);
        self
    }

    pub async fn run(&self) -> Result<()> {
        let empty = Vec::new();
        let processes = self.processes.as_ref().unwrap_or(&empty);
        Self::pre_run_processes(processes, self.pre_run_tasks_timeout).await?;

        let shutdown = CancellationToken::new();
        let mut runnable_tasks = Self::run_processes(processes, shutdown.clone());

        let app_server =
            bootstrap_server(&self.addr, default_router(), ServerKind::Application);
        let metrics_server =
            bootstrap_server(&self.metrics_addr, metrics_router(), ServerKind::Metrics);

        tokio::try_join!(app_server, metrics_server).context("failed to bootstrap servers")?;

        shutdown.cancel();
        Self::shutdown_processes(&mut runnable_tasks).await;

        Ok(())
    }

    async fn pre_run_processes(
        processes: &[Arc<dyn HttpServerProcess>],
        tasks_timeout: Duration,
    ) -> Result<()> {
        let tasks: Vec<_> = processes
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                tokio::spawn(async move { timeout(tasks_timeout, p.pre_run()).await })
            })
            .collect();

        for task in tasks {
            let result = task.await?.context("pre-run task timed out")?;
            result?;
        }

        Ok(())
    }

    fn run_processes(
        processes: &[Arc<dyn HttpServerProcess>],
        token: CancellationToken,
    ) -> Vec<JoinHandle<Result<()>>> {
        processes
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                let token = token.clone();
                tokio::spawn(async move { p.run(token).await })
            })
            .collect()
    }

    async fn shutdown_processes(tasks: &mut [JoinHandle<Result<()>>]) {
        for task in tasks.iter_mut() {
            if let Err(e) = task.await {
                error!(error = ?e, "failed to await run task");
            }
        }
    }
}

async fn bootstrap_server(addr: &str, router: Router, kind: ServerKind) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {kind} server on {addr}"))?;

    info!(%addr, %kind, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .with_context(|| format!("{kind} server failed on {addr}"))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[derive(Copy, Clone)]
enum ServerKind {
    Application,
    Metrics,
}

impl Display for ServerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Application => write!(f, "app"),
            Self::Metrics => write!(f, "metrics"),
        }
    }
}

fn default_router() -> Router {
    Router::new()
        .route("/readiness", get(|| async { "OK" }))
        .route("/liveness", get(|| async { "OK" }))
}

fn metrics_router() -> Router {
    let handle = setup_metrics_recorder();
    default_router().route("/metrics", get(move || ready(handle.render())))
}

fn setup_metrics_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}
