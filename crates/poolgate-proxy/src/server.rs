//! HTTP front end.
//!
//! `HttpServer` accepts HTTP/1.1 connections and hands every request to a
//! handler callback. The dispatcher provides the callback for the
//! daemon; `poolgate-echo` uses `echo_handler`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Pause after a failed `accept` before polling the listener again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Body type of every response produced by the front end.
pub type ProxyBody = UnsyncBoxBody<Bytes, hyper::Error>;

/// Callback type for handling HTTP requests.
pub type RequestHandler = Arc<dyn Fn(Request<Incoming>) -> BoxFuture + Send + Sync>;

type BoxFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = anyhow::Result<Response<ProxyBody>>> + Send>,
>;

/// Build a plain-text response.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ProxyBody> {
    let body = Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// HTTP server.
///
/// Binds to a TCP port and forwards incoming HTTP requests to a
/// handler callback.
pub struct HttpServer {
    bind_addr: SocketAddr,
    handler: RequestHandler,
}

impl HttpServer {
    /// Create a new server for the given address.
    pub fn new(bind_addr: SocketAddr, handler: RequestHandler) -> Self {
        Self { bind_addr, handler }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Bind and serve until the shutdown signal is received.
    pub async fn serve(self, shutdown: tokio::sync::watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.bind_addr))?;
        Self::serve_listener(listener, self.handler, shutdown).await
    }

    /// Serve on an already-bound listener.
    ///
    /// Spawns a tokio task per connection using HTTP/1.1. Connections
    /// accepted before shutdown run to completion.
    pub async fn serve_listener(
        listener: TcpListener,
        handler: RequestHandler,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let local_addr = listener.local_addr().context("listener address")?;
        info!(addr = %local_addr, "HTTP server listening");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let Some((stream, peer_addr)) = accepted(accept_result).await else {
                        continue;
                    };
                    let handler = handler.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let handler = handler.clone();
                            async move {
                                match handler(req).await {
                                    Ok(resp) => Ok::<_, hyper::Error>(resp),
                                    Err(e) => {
                                        error!(%peer_addr, error = %e, "request handler failed");
                                        Ok(text_response(
                                            StatusCode::INTERNAL_SERVER_ERROR,
                                            "Internal Server Error",
                                        ))
                                    }
                                }
                            }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, svc)
                            .await
                        {
                            debug!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("HTTP server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Unwrap an `accept` result, pausing briefly when it failed.
///
/// Accept errors (out of descriptors, aborted handshakes) leave the
/// listener usable, so they never end the accept loop.
async fn accepted(
    result: std::io::Result<(TcpStream, SocketAddr)>,
) -> Option<(TcpStream, SocketAddr)> {
    match result {
        Ok(connection) => Some(connection),
        Err(e) => {
            warn!(error = %e, "failed to accept connection");
            tokio::time::sleep(ACCEPT_BACKOFF).await;
            None
        }
    }
}

/// Handler answering `"<METHOD> <path>\n<body>"` for every request.
///
/// The worker's port is reported in an `x-poolgate-worker` header.
pub fn echo_handler(port: u16) -> RequestHandler {
    Arc::new(move |req: Request<Incoming>| {
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await.context("read request body")?.to_bytes();

            let mut echoed = format!("{} {}\n", parts.method, parts.uri.path()).into_bytes();
            echoed.extend_from_slice(&body);

            let mut response = text_response(StatusCode::OK, echoed);
            response
                .headers_mut()
                .insert("x-poolgate-worker", HeaderValue::from(port));
            Ok(response)
        })
    })
}
