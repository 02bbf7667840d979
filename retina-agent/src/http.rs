//! Minimal `/metrics` endpoint, modeled on
//! `huginn-proxy-lib::telemetry::server::start_observability_server` and
//! `metrics_handler::handle_metrics` — trimmed to the one route this
//! demonstration needs.

use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

type RespBody = BoxBody<Bytes, hyper::Error>;

fn not_found() -> Response<RespBody> {
    let body = Full::new(Bytes::from("Not Found")).map_err(|never| match never {}).boxed();
    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::NOT_FOUND;
    resp
}

fn internal_error() -> Response<RespBody> {
    let body = Full::new(Bytes::from("Internal Server Error")).map_err(|never| match never {}).boxed();
    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    resp
}

fn render_metrics(registry: &Registry) -> Response<RespBody> {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return internal_error();
    }
    let body = Full::new(Bytes::from(buffer)).map_err(|never| match never {}).boxed();
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", encoder.format_type())
        .body(body)
        .unwrap_or_else(|_| internal_error())
}

/// Serve `/metrics` on `port` until the process receives SIGTERM/SIGINT.
pub async fn serve_metrics(port: u16, registry: Registry) -> std::io::Result<()> {
    let registry = Arc::new(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(?addr, "metrics endpoint listening");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("metrics endpoint: received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("metrics endpoint: received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "metrics endpoint: accept error");
                        continue;
                    }
                };
                let registry = registry.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let registry = registry.clone();
                        async move {
                            let resp = if req.uri().path() == "/metrics" {
                                render_metrics(&registry)
                            } else {
                                not_found()
                            };
                            Ok::<_, hyper::Error>(resp)
                        }
                    });
                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "metrics endpoint: serve_connection error");
                    }
                });
            }
        }
    }

    info!("metrics endpoint stopped");
    Ok(())
}
