//! Worker leases — the `Busy` flag as an RAII guard.
//!
//! A `WorkerLease` marks its worker `Busy` when claimed and `Idle` when
//! dropped. `LeasedBody` carries the lease inside the streamed response
//! body, so the worker stays busy until the last frame has been sent to
//! the client, the worker connection fails, or the client goes away.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use hyper::body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use tracing::debug;

use poolgate_pool::{WorkerClaim, WorkerPool};

/// Exclusive claim on one idle worker.
pub struct WorkerLease {
    pool: WorkerPool,
    claim: WorkerClaim,
}

impl WorkerLease {
    /// Claim the first idle worker, if any.
    pub fn claim(pool: &WorkerPool) -> Option<Self> {
        let claim = pool.claim_idle()?;
        debug!(port = claim.port, "worker leased");
        Some(Self {
            pool: pool.clone(),
            claim,
        })
    }

    pub fn port(&self) -> u16 {
        self.claim.port
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.pool.release(self.claim);
        debug!(port = self.claim.port, "worker released");
    }
}

impl std::fmt::Debug for WorkerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLease")
            .field("port", &self.claim.port)
            .field("generation", &self.claim.generation)
            .finish()
    }
}

pin_project! {
    /// A response body that releases its worker lease once exhausted.
    pub struct LeasedBody<B> {
        #[pin]
        inner: B,
        lease: Option<WorkerLease>,
    }
}

impl<B> LeasedBody<B> {
    pub fn new(inner: B, lease: WorkerLease) -> Self {
        Self {
            inner,
            lease: Some(lease),
        }
    }
}

impl<B: Body> Body for LeasedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let frame = ready!(this.inner.poll_frame(cx));
        if matches!(frame, None | Some(Err(_))) {
            this.lease.take();
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use poolgate_pool::{WorkerProcess, WorkerSpawner};
    use poolgate_state::WorkerStatus;

    struct NoopSpawner;
    struct NoopProcess;

    impl WorkerProcess for NoopProcess {
        fn id(&self) -> Option<u32> {
            None
        }

        fn kill(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl WorkerSpawner for NoopSpawner {
        fn spawn(&self, _port: u16) -> std::io::Result<Box<dyn WorkerProcess>> {
            Ok(Box::new(NoopProcess))
        }
    }

    fn pool_with_one_worker() -> WorkerPool {
        let pool = WorkerPool::new(Arc::new(NoopSpawner));
        pool.start_worker(5000).unwrap();
        pool
    }

    #[test]
    fn lease_marks_busy_until_dropped() {
        let pool = pool_with_one_worker();

        let lease = WorkerLease::claim(&pool).unwrap();
        assert_eq!(lease.port(), 5000);
        assert_eq!(pool.status_of(5000), Some(WorkerStatus::Busy));
        assert!(WorkerLease::claim(&pool).is_none());

        drop(lease);
        assert_eq!(pool.status_of(5000), Some(WorkerStatus::Idle));
    }

    #[tokio::test]
    async fn body_releases_lease_when_exhausted() {
        let pool = pool_with_one_worker();
        let lease = WorkerLease::claim(&pool).unwrap();
        let mut body = LeasedBody::new(Full::new(Bytes::from_static(b"hello")), lease);

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(pool.status_of(5000), Some(WorkerStatus::Busy));

        assert!(body.frame().await.is_none());
        assert_eq!(pool.status_of(5000), Some(WorkerStatus::Idle));
    }

    #[test]
    fn lease_outliving_its_worker_does_not_free_a_successor() {
        let pool = pool_with_one_worker();
        let stale = WorkerLease::claim(&pool).unwrap();

        pool.stop_worker(5000);
        pool.start_worker(5000).unwrap();
        let current = WorkerLease::claim(&pool).unwrap();

        drop(stale);
        assert_eq!(pool.status_of(5000), Some(WorkerStatus::Busy));
        assert!(WorkerLease::claim(&pool).is_none());

        drop(current);
        assert_eq!(pool.status_of(5000), Some(WorkerStatus::Idle));
    }

    #[test]
    fn dropping_unread_body_releases_lease() {
        let pool = pool_with_one_worker();
        let lease = WorkerLease::claim(&pool).unwrap();
        let body = LeasedBody::new(Full::new(Bytes::from_static(b"unread")), lease);

        drop(body);
        assert_eq!(pool.status_of(5000), Some(WorkerStatus::Idle));
    }
}
