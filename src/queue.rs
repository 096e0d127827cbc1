//! Serialized FIFO queue in front of the provider
//!
//! Any number of callers may enqueue concurrently; a single worker task runs
//! the queued operations one at a time, in arrival order, each gated by the
//! governor. The worker is spawned when a task arrives at an idle queue and
//! exits as soon as the queue is empty.

use crate::{
    cache::CacheStore,
    error::SchedulerError,
    fetcher::Fetcher,
    governor::Governor,
    operation::{CacheKey, Operation},
    types::MarketResponse,
};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use uuid::Uuid;

/// A queued operation and the channel its caller waits on
struct QueueTask {
    id: Uuid,
    operation: Operation,
    key: CacheKey,
    respond_to: oneshot::Sender<MarketResponse>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueTask>,
    draining: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    cache: Arc<CacheStore>,
    governor: Arc<Governor>,
    fetcher: Arc<Fetcher>,
}

/// FIFO request queue with a lazily started single worker
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

impl RequestQueue {
    pub fn new(cache: Arc<CacheStore>, governor: Arc<Governor>, fetcher: Arc<Fetcher>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                cache,
                governor,
                fetcher,
            }),
        }
    }

    /// Appends `operation` to the queue and returns the future of its response
    ///
    /// The task takes its place in the queue when this method is called, not
    /// when the returned future is first polled. Dropping the future does not
    /// cancel the task. An invalid operation is rejected without being queued.
    /// Must be called from within a tokio runtime.
    pub fn enqueue(
        &self,
        operation: Operation,
    ) -> impl Future<Output = Result<MarketResponse, SchedulerError>> + Send + 'static {
        let response = self.push(operation);

        async move {
            response?
                .await
                .map_err(|_| SchedulerError::internal("request worker dropped the task"))
        }
    }

    fn push(
        &self,
        operation: Operation,
    ) -> Result<oneshot::Receiver<MarketResponse>, SchedulerError> {
        operation.validate()?;

        let (respond_to, response) = oneshot::channel();
        let task = QueueTask {
            id: Uuid::new_v4(),
            key: operation.cache_key(),
            operation,
            respond_to,
        };

        tracing::debug!(task_id = %task.id, key = %task.key, "Enqueued provider request");

        let start_worker = {
            let mut state = self.inner.lock_state();
            state.pending.push_back(task);
            let idle = !state.draining;
            state.draining = true;
            idle
        };

        if start_worker {
            tokio::spawn(self.inner.clone().drain());
        }

        Ok(response)
    }

    /// Number of tasks waiting for the worker
    pub fn len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true while a worker is running
    #[cfg(test)]
    pub fn is_draining(&self) -> bool {
        self.inner.lock_state().draining
    }
}

/// Hands the remaining tasks to a fresh worker if the current one unwinds
///
/// The task being run when the panic hit is lost and its caller gets an
/// `Internal` error. With nothing left to run the queue is marked idle so the
/// next enqueue spawns a worker.
struct DrainGuard(Arc<QueueInner>);

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }

        let mut state = self.0.lock_state();
        if state.pending.is_empty() {
            state.draining = false;
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(
                    pending = state.pending.len(),
                    "Request worker panicked, restarting"
                );
                drop(state);
                handle.spawn(self.0.clone().drain());
            }
            Err(_) => {
                tracing::error!(
                    pending = state.pending.len(),
                    "Request worker panicked outside a runtime, queue left idle"
                );
                state.draining = false;
            }
        }
    }
}

impl QueueInner {
    /// Lock the state mutex, recovering from poison if necessary.
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Request queue mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    async fn drain(self: Arc<Self>) {
        let _guard = DrainGuard(self.clone());
        tracing::debug!("Request worker started");

        loop {
            let task = {
                let mut state = self.lock_state();
                match state.pending.pop_front() {
                    Some(task) => task,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };
            self.run(task).await;
        }

        tracing::debug!("Request queue drained, worker stopping");
    }

    async fn run(&self, task: QueueTask) {
        // An earlier task for the same key may have filled the cache while this one waited
        let response = match self.cache.get(&task.key).await {
            Some(cached) => {
                tracing::debug!(task_id = %task.id, key = %task.key, "Queued request served from cache");
                cached
            }
            None => {
                self.governor.admit().await;
                self.fetcher.fetch(&task.operation, &task.key).await
            }
        };

        if task.respond_to.send(response).is_err() {
            tracing::debug!(task_id = %task.id, "Caller stopped waiting for response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::config::RateBudget;
    use crate::error::ProviderError;
    use crate::fallback;
    use crate::metrics::MetricsCollector;
    use crate::provider::mock::MockProvider;
    use crate::provider::MarketDataProvider;
    use crate::types::MarketData;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Panics on its first call, answers with synthetic data afterwards
    #[derive(Default)]
    struct PanicsOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for PanicsOnce {
        async fn fetch(&self, operation: &Operation) -> Result<MarketData, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("provider blew up");
            }
            Ok(fallback::synthesize(operation))
        }

        fn provider_name(&self) -> &'static str {
            "panics-once"
        }
    }

    fn queue(provider: Arc<dyn MarketDataProvider>) -> RequestQueue {
        let clock = Arc::new(TokioClock);
        let governor = Arc::new(Governor::new(RateBudget::default(), clock.clone()));
        let cache = Arc::new(CacheStore::new(Duration::from_secs(60), clock));
        let fetcher = Arc::new(Fetcher::new(
            provider,
            governor.clone(),
            cache.clone(),
            Arc::new(MetricsCollector::new("mock")),
            Duration::from_secs(20),
        ));
        RequestQueue::new(cache, governor, fetcher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_resolve_in_enqueue_order() {
        let provider = Arc::new(MockProvider::new().with_latency(Duration::from_millis(300)));
        let queue = queue(provider.clone());
        let resolved = Arc::new(Mutex::new(Vec::new()));

        let ops: Vec<Operation> = (1..=6).map(|n| Operation::list_markets("usd", n)).collect();
        let mut handles = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            let pending = queue.enqueue(op.clone());
            let resolved = resolved.clone();
            handles.push(tokio::spawn(async move {
                pending.await.unwrap();
                resolved.lock().unwrap().push(i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*resolved.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
        let called: Vec<Operation> = provider.calls().into_iter().map(|(op, _)| op).collect();
        assert_eq!(called, ops);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_queued_tasks_share_one_call() {
        let provider = Arc::new(MockProvider::new());
        let queue = queue(provider.clone());

        let first = queue.enqueue(Operation::global_market());
        let second = queue.enqueue(Operation::global_market());
        let (a, b) = (first.await.unwrap(), second.await.unwrap());

        assert_eq!(a, b);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_stops_when_idle_and_restarts() {
        let provider = Arc::new(MockProvider::new());
        let queue = queue(provider.clone());
        assert!(!queue.is_draining());

        queue.enqueue(Operation::global_market()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!queue.is_draining());
        assert!(queue.is_empty());

        queue
            .enqueue(Operation::list_markets("usd", 10))
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_cancel_task() {
        let provider = Arc::new(MockProvider::new());
        let queue = queue(provider.clone());

        drop(queue.enqueue(Operation::global_market()));
        queue
            .enqueue(Operation::list_markets("usd", 10))
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_operation_is_rejected_before_queueing() {
        let provider = Arc::new(MockProvider::new());
        let queue = queue(provider.clone());

        let op = Operation::ListMarkets {
            currency: "usd&x=1".to_string(),
            per_page: 10,
        };
        let err = queue.enqueue(op).await.unwrap_err();

        assert!(matches!(err, SchedulerError::InvalidOperation(_)));
        assert!(queue.is_empty());
        assert!(!queue.is_draining());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_panic_restarts_for_waiting_tasks() {
        let provider = Arc::new(PanicsOnce::default());
        let queue = queue(provider.clone());

        let first = queue.enqueue(Operation::global_market());
        let second = queue.enqueue(Operation::list_markets("usd", 10));

        let err = first.await.unwrap_err();
        assert!(matches!(err, SchedulerError::Internal(_)));

        let response = tokio::time::timeout(Duration::from_secs(30), second)
            .await
            .expect("queued task left stranded after worker panic")
            .unwrap();
        assert!(matches!(response.data, MarketData::Markets(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!queue.is_draining());
    }
}
