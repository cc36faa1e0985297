use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Failure-counting gate in front of the external inference service.
///
/// Closed: calls pass through and failures increment a counter. Open (after
/// `threshold` failures): every call fails fast with [`BreakerError::Open`]
/// without touching the dependency. The breaker closes again after `timeout`
/// via a scheduled reset task, and any successful call resets the counter.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    timeout: Duration,
    inner: Mutex<BreakerInner>,
    self_ref: Weak<CircuitBreaker>,
}

#[derive(Debug)]
struct BreakerInner {
    open: bool,
    failure_count: u32,
    reset_task: Option<JoinHandle<()>>,
}

/// Introspection snapshot, exposed over the status API.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BreakerStatus {
    pub open: bool,
    pub failure_count: u32,
    pub threshold: u32,
}

#[derive(Debug, Error)]
pub enum BreakerError<E>
where
    E: std::error::Error,
{
    /// The breaker is open; the protected call was not attempted.
    #[error("circuit breaker open, call rejected")]
    Open,

    #[error(transparent)]
    Service(E),
}

impl CircuitBreaker {
    pub fn new(threshold: u32, timeout: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            threshold,
            timeout,
            inner: Mutex::new(BreakerInner {
                open: false,
                failure_count: 0,
                reset_task: None,
            }),
            self_ref: weak.clone(),
        })
    }

    /// Run `fut` through the breaker, recording the outcome.
    pub async fn call<T, E, Fut>(&self, fut: Fut) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.is_open() {
            return Err(BreakerError::Open);
        }

        match fut.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Service(e))
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().expect("breaker lock poisoned").open
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        BreakerStatus {
            open: inner.open,
            failure_count: inner.failure_count,
            threshold: self.threshold,
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failure_count = 0;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failure_count += 1;

        if !inner.open && inner.failure_count >= self.threshold {
            inner.open = true;
            tracing::warn!(
                failures = inner.failure_count,
                threshold = self.threshold,
                "Circuit breaker opened"
            );

            // Scheduled auto-reset, owned by the breaker so shutdown can
            // cancel it.
            if let Some(breaker) = self.self_ref.upgrade() {
                let timeout = self.timeout;
                inner.reset_task = Some(tokio::spawn(async move {
                    sleep(timeout).await;
                    breaker.reset();
                }));
            }
        }
    }

    /// Close the breaker and zero the failure counter.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.open {
            tracing::info!("Circuit breaker reset, dependency calls resume");
        }
        inner.open = false;
        inner.failure_count = 0;
        inner.reset_task = None;
    }

    /// Cancel the pending auto-reset task, if any. Called on shutdown.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if let Some(task) = inner.reset_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    async fn failing_call(breaker: &CircuitBreaker) -> Result<(), BreakerError<Boom>> {
        breaker.call::<(), _, _>(async { Err(Boom) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_failures_and_fails_fast() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            let err = failing_call(&breaker).await.unwrap_err();
            assert!(matches!(err, BreakerError::Service(_)));
        }
        assert!(breaker.is_open());

        // Next call must be rejected without invoking the protected future.
        let invoked = AtomicU32::new(0);
        let err = breaker
            .call::<(), Boom, _>(async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BreakerError::Open));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_resets_after_timeout() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));

        for _ in 0..2 {
            let _ = failing_call(&breaker).await;
        }
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_secs(61)).await;

        let status = breaker.status();
        assert!(!status.open);
        assert_eq!(status.failure_count, 0);

        // Calls pass through again.
        let ok = breaker.call::<u32, Boom, _>(async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_counter() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        let _ = failing_call(&breaker).await;
        let _ = failing_call(&breaker).await;
        assert_eq!(breaker.status().failure_count, 2);

        let _ = breaker.call::<(), Boom, _>(async { Ok(()) }).await;
        assert_eq!(breaker.status().failure_count, 0);

        // Two more failures alone no longer reach the threshold.
        let _ = failing_call(&breaker).await;
        let _ = failing_call(&breaker).await;
        assert!(!breaker.is_open());
    }
}
