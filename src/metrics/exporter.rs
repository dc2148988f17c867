//! HTTP exposition of the metrics sink.
//!
//! Serves `GET /metrics` in the Prometheus text exposition format. The
//! endpoint is read-only and unauthenticated; it is the only externally
//! observable health signal of the monitoring layer, so a failure to bind
//! it is fatal for the caller.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{Encoder, TextEncoder};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::MetricsSink;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind metrics endpoint to `{addr}`: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

type Result<T> = std::result::Result<T, Error>;

async fn render_metrics(State(sink): State<Arc<MetricsSink>>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&sink.gather(), &mut buffer) {
        log::error!("Failed to encode metrics exposition: {}", err);
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "failed to encode metrics",
        )
            .into_response();
    }
    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
        buffer,
    )
        .into_response()
}

fn router(sink: Arc<MetricsSink>) -> axum::Router {
    axum::Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(sink)
}

pub struct MetricsExporter {
    router: axum::Router,
}

impl MetricsExporter {
    pub fn new(sink: Arc<MetricsSink>) -> Self {
        Self {
            router: router(sink),
        }
    }

    /// Binds `addr` and spawns the serving task.
    ///
    /// The task runs until `shutdown` is cancelled, then finishes in-flight
    /// requests and exits. A serve failure after a successful bind is logged
    /// at error level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] when the listener cannot be bound.
    pub async fn serve(self, addr: &str, shutdown: CancellationToken) -> Result<JoinHandle<()>> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        log::debug!("Serving metrics on http://{addr}/metrics");
        Ok(tokio::spawn(async move {
            let serve = axum::serve(listener, self.router.into_make_service())
                .with_graceful_shutdown(shutdown.cancelled_owned());
            if let Err(err) = serve.await {
                log::error!("Metrics endpoint terminated: {}", err);
            }
        }))
    }
}
