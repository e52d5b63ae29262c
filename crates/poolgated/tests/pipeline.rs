//! End-to-end pipeline tests.
//!
//! Wires the worker pool, autoscaler and dispatcher together the way
//! `poolgated` does, with workers served either by the real
//! `poolgate-echo` binary or by in-process echo servers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use poolgate_autoscale::{Autoscaler, ScaleDecision};
use poolgate_pool::{CommandSpawner, WorkerPool, WorkerProcess, WorkerSpawner};
use poolgate_proxy::{Dispatcher, HttpServer, NO_WORKERS_BODY, WorkerLease, echo_handler};
use poolgate_state::WorkerStatus;

/// Serves every worker port with an in-process echo server.
struct InProcessSpawner;

struct InProcessWorker {
    handle: JoinHandle<anyhow::Result<()>>,
    _shutdown: watch::Sender<bool>,
}

impl WorkerProcess for InProcessWorker {
    fn id(&self) -> Option<u32> {
        None
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.handle.abort();
        Ok(())
    }
}

impl WorkerSpawner for InProcessSpawner {
    fn spawn(&self, port: u16) -> std::io::Result<Box<dyn WorkerProcess>> {
        let listener = std::net::TcpListener::bind(("127.0.0.1", port))?;
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(HttpServer::serve_listener(listener, echo_handler(port), rx));
        Ok(Box::new(InProcessWorker {
            handle,
            _shutdown: tx,
        }))
    }
}

/// A loopback port that was free a moment ago.
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// A base port whose successor was also free a moment ago; scale-up
/// from a single worker binds `base + 1`.
fn free_port_pair() -> u16 {
    loop {
        let base = free_port();
        let Some(next) = base.checked_add(1) else {
            continue;
        };
        let held = std::net::TcpListener::bind(("127.0.0.1", base));
        let successor = std::net::TcpListener::bind(("127.0.0.1", next));
        if held.is_ok() && successor.is_ok() {
            return base;
        }
    }
}

fn get(path: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .uri(path)
        .header("host", "localhost")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[tokio::test]
async fn echo_worker_process_round_trip() {
    let port = free_port();
    let spawner = CommandSpawner::new(env!("CARGO_BIN_EXE_poolgate-echo"));
    let pool = WorkerPool::new(Arc::new(spawner));
    pool.start_worker(port).unwrap();
    let dispatcher = Dispatcher::new(pool.clone());

    // No readiness handshake: retry until the worker has bound its port.
    let mut response = dispatcher.dispatch(get("/hello")).await;
    for _ in 0..100 {
        if response.status() != StatusCode::BAD_GATEWAY {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        response = dispatcher.dispatch(get("/hello")).await;
    }

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-poolgate-worker"], port.to_string().as_str());
    assert_eq!(pool.status_of(port), Some(WorkerStatus::Busy));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"GET /hello\n"));
    assert_eq!(pool.status_of(port), Some(WorkerStatus::Idle));

    pool.shutdown();
    assert!(pool.is_empty());
}

#[tokio::test]
async fn saturation_grows_pool_and_idleness_shrinks_it() {
    let base = free_port_pair();
    let pool = WorkerPool::new(Arc::new(InProcessSpawner));
    pool.start_worker(base).unwrap();
    let scaler = Autoscaler::new(pool.clone(), base).with_cpu_probe(|| 4);
    let dispatcher = Dispatcher::new(pool.clone());

    // Hold the only worker busy.
    let first = dispatcher.dispatch(get("/one")).await;
    assert_eq!(first.status(), StatusCode::OK);

    assert_eq!(scaler.tick().unwrap(), ScaleDecision::ScaleUp { port: base + 1 });
    assert_eq!(pool.len(), 2);

    // The new worker takes the next request.
    let second = dispatcher.dispatch(get("/two")).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        second.headers()["x-poolgate-worker"],
        (base + 1).to_string().as_str()
    );
    assert_eq!(pool.busy_count(), 2);

    // Finish both requests, then shrink back to the floor.
    let body = first.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"GET /one\n"));
    drop(second);
    assert_eq!(pool.busy_count(), 0);

    assert_eq!(
        scaler.tick().unwrap(),
        ScaleDecision::ScaleDown { ports: vec![base] }
    );
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.snapshot()[0].port, base + 1);
    assert!(pool.is_consistent());

    // Floor: a lone idle worker survives further ticks.
    assert_eq!(scaler.tick().unwrap(), ScaleDecision::NoChange);
    assert_eq!(pool.len(), 1);

    pool.shutdown();
}

#[tokio::test]
async fn pool_never_exceeds_cpu_ceiling() {
    let base = free_port_pair();
    let pool = WorkerPool::new(Arc::new(InProcessSpawner));
    pool.start_worker(base).unwrap();
    let scaler = Autoscaler::new(pool.clone(), base).with_cpu_probe(|| 2);

    let _held = WorkerLease::claim(&pool).unwrap();
    scaler.tick().unwrap();
    let _held_too = WorkerLease::claim(&pool).unwrap();

    assert_eq!(pool.len(), 2);
    assert_eq!(scaler.tick().unwrap(), ScaleDecision::NoChange);
    assert_eq!(pool.len(), 2);

    pool.shutdown();
}

#[tokio::test]
async fn front_end_rejects_when_saturated() {
    let pool = WorkerPool::new(Arc::new(InProcessSpawner));
    pool.start_worker(free_port()).unwrap();
    let _held = WorkerLease::claim(&pool).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = watch::channel(false);
    let server = tokio::spawn(HttpServer::serve_listener(
        listener,
        Dispatcher::new(pool.clone()).into_handler(),
        rx,
    ));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    assert!(raw.starts_with("HTTP/1.1 500"));
    assert!(raw.ends_with(NO_WORKERS_BODY));
    assert_eq!(pool.busy_count(), 1);

    tx.send(true).unwrap();
    server.await.unwrap().unwrap();
    pool.shutdown();
}
