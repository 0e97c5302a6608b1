//! `ngraph serve` — Expose connection metrics over HTTP.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Args;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use ngraph_collector::collector::Collector;
use ngraph_collector::metrics::{ConnectionsExporter, encode};
use ngraph_common::config::{CollectorConfig, ExporterConfig};
use ngraph_common::constants;
use prometheus::Registry;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = constants::DEFAULT_LISTEN_ADDRESS, env = "NGRAPH_LISTEN_ADDRESS")]
    pub listen_address: SocketAddr,

    /// Path under which metrics are served.
    #[arg(long, default_value = constants::DEFAULT_METRICS_PATH, env = "NGRAPH_METRICS_PATH")]
    pub metrics_path: String,
}

struct State {
    registry: Registry,
    metrics_path: String,
}

/// Executes the `serve` command.
///
/// Every scrape of the metrics path runs a fresh collection pass. Runs
/// until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the address cannot be
/// bound, or the server fails.
pub fn execute(args: ServeArgs, config: CollectorConfig) -> anyhow::Result<()> {
    let exporter = ExporterConfig::new(args.listen_address, args.metrics_path)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(exporter, config))
}

async fn serve(exporter: ExporterConfig, config: CollectorConfig) -> anyhow::Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let registry = Registry::new();
    registry.register(Box::new(ConnectionsExporter::new(
        Collector::new(config),
        Arc::clone(&cancel),
    )?))?;
    let state = Arc::new(State {
        registry,
        metrics_path: exporter.metrics_path.clone(),
    });

    let make_svc = make_service_fn(move |_conn| {
        let state = Arc::clone(&state);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle(req, Arc::clone(&state))))
        }
    });

    let server = Server::try_bind(&exporter.listen_address)?.serve(make_svc);
    tracing::info!(
        address = %exporter.listen_address,
        path = %exporter.metrics_path,
        "serving metrics"
    );

    server
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for shutdown signal");
                return;
            }
            cancel.store(true, Ordering::Relaxed);
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn handle(req: Request<Body>, state: Arc<State>) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path();
    if path == state.metrics_path {
        return Ok(metrics(state).await);
    }
    if path == "/" {
        let mut resp = Response::new(Body::from(landing_page(&state.metrics_path)));
        let _ = resp
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        return Ok(resp);
    }
    Ok(status(StatusCode::NOT_FOUND))
}

async fn metrics(state: Arc<State>) -> Response<Body> {
    // Gathering runs a pass that blocks on namespace switching.
    let gathered = tokio::task::spawn_blocking(move || encode(&state.registry.gather())).await;
    match gathered {
        Ok(Ok(text)) => {
            let mut resp = Response::new(Body::from(text));
            let _ = resp
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(prometheus::TEXT_FORMAT));
            resp
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "cannot encode metrics");
            status(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            tracing::error!(error = %e, "metrics task failed");
            status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn status(code: StatusCode) -> Response<Body> {
    let mut resp = Response::default();
    *resp.status_mut() = code;
    resp
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        "<html>\n<head><title>ngraph exporter</title></head>\n<body>\n<h1>ngraph exporter</h1>\n<p><a href=\"{metrics_path}\">Metrics</a></p>\n</body>\n</html>\n"
    )
}
