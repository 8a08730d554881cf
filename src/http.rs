use std::{future::IntoFuture, time::Duration};

use anyhow::Context as _;
use axum::{http::StatusCode, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};

use crate::{
    context::Context,
    task::{FailureKind, SupervisedTask, TaskError, TaskResult},
};

/// Host every [`Server`] binds to.
pub const BIND_HOST: &str = "0.0.0.0";

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Port to listen on, joined with [`BIND_HOST`]. Defaults to `8080`.
    pub port: String,
    /// Upper bound for reading a request body. Defaults to 10s.
    pub read_timeout: Duration,
    /// Upper bound for a handler to produce its response. Defaults to 10s.
    pub write_timeout: Duration,
    /// How long in-flight requests may take to finish once the server is
    /// asked to stop. Defaults to 5s.
    pub drain_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: "8080".into(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl HttpConfig {
    pub fn listen_addr(&self) -> String {
        format!("{BIND_HOST}:{}", self.port)
    }
}

/// Serves an axum [`Router`] until its context is done, then drains.
///
/// The server binds when it starts running, so a bad port is reported as
/// an immediate failure. Once the context is done, the listener stops
/// accepting and in-flight requests get up to
/// [`drain_timeout`](HttpConfig::drain_timeout) to complete, measured
/// independently of the context that triggered the shutdown. The run then
/// returns the cancellation cause.
pub struct Server {
    router: Router,
    config: HttpConfig,
}

impl Server {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            config: HttpConfig::default(),
        }
    }

    pub fn with_config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.config.port = port.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

fn server_failure(source: anyhow::Error) -> TaskError {
    TaskError::with_kind(FailureKind::Server, source)
}

impl SupervisedTask for Server {
    async fn run(self, ctx: Context) -> TaskResult {
        let Self { router, config } = self;

        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))
            .map_err(server_failure)?;
        tracing::info!(%addr, "starting http server");

        let app = router
            .layer(RequestBodyTimeoutLayer::new(config.read_timeout))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.write_timeout,
            ));

        let drain = CancellationToken::new();
        let serving = axum::serve(listener, app)
            .with_graceful_shutdown(drain.clone().cancelled_owned())
            .into_future();
        tokio::pin!(serving);

        // Serve until the listener fails or the context is done.
        let cause = tokio::select! {
            result = &mut serving => {
                return match result {
                    Ok(()) => Ok(()),
                    Err(err) => Err(server_failure(
                        anyhow::Error::new(err).context("http server failed"),
                    )),
                };
            }
            cause = ctx.done() => cause,
        };

        // Drain, bounded by a timeout that ignores the parent context.
        tracing::info!(%addr, "draining http server");
        drain.cancel();
        let (drain_ctx, _drain_cancel) = ctx.without_cancel().with_timeout(config.drain_timeout);
        tokio::select! {
            result = &mut serving => {
                if let Err(err) = result {
                    return Err(server_failure(
                        anyhow::Error::new(err).context("http server failed while draining"),
                    ));
                }
                tracing::info!(%addr, "http server stopped");
            }
            _ = drain_ctx.done() => {
                tracing::warn!(
                    %addr,
                    timeout = ?config.drain_timeout,
                    "drain timed out, dropping open connections"
                );
            }
        }
        Err(cause.into())
    }
}
