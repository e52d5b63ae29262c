//! poolgate-proxy — the request dispatcher.
//!
//! Fronts the worker pool with a catch-all HTTP/1.1 reverse proxy. Each
//! inbound request claims the first idle worker, is forwarded verbatim
//! to `localhost:<port>`, and the worker's response is streamed back.
//!
//! # Architecture
//!
//! ```text
//! HTTP client
//!   │
//!   ▼
//! HttpServer (hyper, one task per connection)
//!   │
//!   ├── Dispatcher: claim idle worker ── none → reject_status
//!   ├── forward request over a fresh loopback connection
//!   ├── wrap worker response body in LeasedBody
//!   │
//!   ▼
//! streamed response; worker marked idle when the body ends or is dropped
//! ```

pub mod dispatcher;
pub mod error;
pub mod lease;
pub mod server;

pub use dispatcher::{Dispatcher, NO_WORKERS_BODY};
pub use error::{ProxyError, ProxyResult};
pub use lease::{LeasedBody, WorkerLease};
pub use server::{HttpServer, ProxyBody, RequestHandler, echo_handler, text_response};
