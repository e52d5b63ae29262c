//! Request dispatcher.
//!
//! Claims the first idle worker in creation order, forwards the request
//! over a fresh loopback HTTP/1.1 connection and streams the response
//! back. Requests arriving while every worker is busy are rejected at
//! once; nothing is queued.

use std::sync::Arc;

use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::{Body, Incoming};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use poolgate_pool::WorkerPool;

use crate::error::{ProxyError, ProxyResult};
use crate::lease::{LeasedBody, WorkerLease};
use crate::server::{ProxyBody, RequestHandler, text_response};

/// Body sent when no worker is idle.
pub const NO_WORKERS_BODY: &str = "No servers available.";

/// Routes inbound requests onto idle workers.
#[derive(Clone)]
pub struct Dispatcher {
    pool: WorkerPool,
    reject_status: StatusCode,
}

impl Dispatcher {
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            pool,
            reject_status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status used when every worker is busy.
    pub fn with_reject_status(mut self, status: StatusCode) -> Self {
        self.reject_status = status;
        self
    }

    /// Dispatch one request.
    ///
    /// The chosen worker stays `Busy` until the returned response body
    /// has been fully streamed or dropped.
    pub async fn dispatch<B>(&self, req: Request<B>) -> Response<ProxyBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(lease) = WorkerLease::claim(&self.pool) else {
            warn!(
                method = %req.method(),
                path = %req.uri().path(),
                status = self.reject_status.as_u16(),
                "no idle worker, rejecting request"
            );
            return text_response(self.reject_status, NO_WORKERS_BODY);
        };

        let port = lease.port();
        debug!(port, method = %req.method(), uri = %req.uri(), "dispatching request");

        match forward(port, req).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, LeasedBody::new(body, lease).boxed_unsync())
            }
            Err(e) => {
                warn!(port, error = %e, "proxy request failed");
                drop(lease);
                text_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
            }
        }
    }

    /// Wrap the dispatcher as a front-end request handler.
    pub fn into_handler(self) -> RequestHandler {
        Arc::new(move |req: Request<Incoming>| {
            let dispatcher = self.clone();
            Box::pin(async move { Ok(dispatcher.dispatch(req).await) })
        })
    }
}

/// Send `req` to the worker on `port` and return its response head.
///
/// The connection is driven by a background task for as long as the
/// response body is being read.
async fn forward<B>(port: u16, req: Request<B>) -> ProxyResult<Response<Incoming>>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = TcpStream::connect(("localhost", port))
        .await
        .map_err(|source| ProxyError::Connect { port, source })?;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(ProxyError::Handshake)?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(port, error = %e, "worker connection closed with error");
        }
    });

    sender.send_request(req).await.map_err(ProxyError::Upstream)
}
