//! Single provider call with timeout, classification and fallback

use crate::{
    cache::CacheStore,
    error::ProviderError,
    fallback,
    governor::Governor,
    metrics::MetricsCollector,
    operation::{CacheKey, Operation},
    provider::MarketDataProvider,
    types::MarketResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Performs provider calls on behalf of the queue worker
///
/// `fetch` never fails: live data and fallback data alike are cached under
/// the operation's key and returned.
pub struct Fetcher {
    provider: Arc<dyn MarketDataProvider>,
    governor: Arc<Governor>,
    cache: Arc<CacheStore>,
    metrics: Arc<MetricsCollector>,
    request_timeout: Duration,
}

impl Fetcher {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        governor: Arc<Governor>,
        cache: Arc<CacheStore>,
        metrics: Arc<MetricsCollector>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            governor,
            cache,
            metrics,
            request_timeout,
        }
    }

    /// Calls the provider for `operation` and caches whatever comes back
    pub async fn fetch(&self, operation: &Operation, key: &CacheKey) -> MarketResponse {
        let start = Instant::now();

        let outcome = match tokio::time::timeout(self.request_timeout, self.provider.fetch(operation))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };

        let response = match outcome {
            Ok(data) => {
                tracing::debug!(
                    key = %key,
                    provider = self.provider.provider_name(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Provider call succeeded"
                );
                self.metrics.record_request(start.elapsed(), None).await;
                MarketResponse::live(data)
            }
            Err(err) => {
                if err == ProviderError::RateLimited {
                    self.governor.penalize();
                }
                tracing::warn!(
                    key = %key,
                    provider = self.provider.provider_name(),
                    error = %err,
                    "Provider call failed, serving fallback data"
                );
                self.metrics
                    .record_request(start.elapsed(), Some(err.kind()))
                    .await;
                MarketResponse::fallback(fallback::synthesize(operation), err.kind())
            }
        };

        self.cache.set(key.clone(), response.clone()).await;
        response
    }
}
