//! Market data scheduler service
//!
//! The public entry point: every provider request of the application goes
//! through one `Scheduler` instance.

use crate::{
    cache::CacheStore,
    clock::{Clock, TokioClock},
    config::SchedulerConfig,
    error::{ProviderError, SchedulerError},
    fetcher::Fetcher,
    governor::{Governor, GovernorSnapshot},
    metrics::{MetricsCollector, ProviderMetrics},
    operation::{ChartRange, Operation},
    provider::MarketDataProvider,
    providers::CoinGeckoProvider,
    queue::RequestQueue,
    types::{
        CoinMarket, ComponentHealth, GlobalMarket, HealthStatus, MarketChart, MarketData,
        MarketResponse, SimplePrices,
    },
};
use std::sync::Arc;

/// Rate-governed, cached access to a market data provider
///
/// Cloning is cheap and every clone shares the same cache, queue and rate
/// budget. Construct one per process and hand clones to the components that
/// need market data.
///
/// # Example
/// ```no_run
/// use market_data_scheduler::{Scheduler, SchedulerConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let scheduler = Scheduler::new(SchedulerConfig::from_env())?;
/// let coins = scheduler.list_markets("usd", 50).await?;
/// for coin in coins {
///     println!("{}: {:.2}", coin.symbol, coin.current_price.unwrap_or_default());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    provider_name: &'static str,
    cache: Arc<CacheStore>,
    governor: Arc<Governor>,
    queue: RequestQueue,
    metrics: Arc<MetricsCollector>,
}

impl Scheduler {
    /// Creates a scheduler talking to CoinGecko
    pub fn new(config: SchedulerConfig) -> Result<Self, ProviderError> {
        let provider = Arc::new(CoinGeckoProvider::new(&config)?);
        Ok(Self::with_provider(provider, config))
    }

    /// Creates a scheduler with a custom provider
    pub fn with_provider(provider: Arc<dyn MarketDataProvider>, config: SchedulerConfig) -> Self {
        Self::with_clock(provider, Arc::new(TokioClock), config)
    }

    /// Creates a scheduler with a custom provider and time source
    pub fn with_clock(
        provider: Arc<dyn MarketDataProvider>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let provider_name = provider.provider_name();
        let cache = Arc::new(CacheStore::new(config.cache_ttl, clock.clone()));
        let governor = Arc::new(Governor::new(config.rate.clone(), clock));
        let metrics = Arc::new(MetricsCollector::new(provider_name));
        let fetcher = Arc::new(Fetcher::new(
            provider,
            governor.clone(),
            cache.clone(),
            metrics.clone(),
            config.request_timeout,
        ));
        let queue = RequestQueue::new(cache.clone(), governor.clone(), fetcher);

        tracing::info!(
            provider = provider_name,
            cache_ttl_secs = config.cache_ttl.as_secs(),
            max_per_window = config.rate.max_per_window,
            window_secs = config.rate.window.as_secs(),
            "Market data scheduler ready"
        );

        Self {
            provider_name,
            cache,
            governor,
            queue,
            metrics,
        }
    }

    /// Runs `operation`, answering from cache when fresh
    ///
    /// Provider failures never surface here: the response then carries
    /// fallback data and says so in its `source`.
    ///
    /// # Errors
    /// `InvalidOperation` for malformed input, `Internal` if the request
    /// worker disappeared.
    pub async fn call(&self, operation: Operation) -> Result<MarketResponse, SchedulerError> {
        operation.validate()?;

        let key = operation.cache_key();
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        self.queue.enqueue(operation).await
    }

    /// Top coins by market cap
    pub async fn list_markets(
        &self,
        currency: &str,
        per_page: u32,
    ) -> Result<Vec<CoinMarket>, SchedulerError> {
        match self.call(Operation::list_markets(currency, per_page)).await?.data {
            MarketData::Markets(rows) => Ok(rows),
            other => Err(unexpected("markets", &other)),
        }
    }

    /// Price history of one coin
    ///
    /// `days` is one of "1", "7", "30", "90", "365".
    pub async fn market_chart(
        &self,
        coin_id: &str,
        currency: &str,
        days: &str,
    ) -> Result<MarketChart, SchedulerError> {
        let days: ChartRange = days.parse()?;
        match self
            .call(Operation::market_chart(coin_id, currency, days))
            .await?
            .data
        {
            MarketData::Chart(chart) => Ok(chart),
            other => Err(unexpected("chart", &other)),
        }
    }

    /// Aggregate market capitalisation and volume
    pub async fn global_market(&self) -> Result<GlobalMarket, SchedulerError> {
        match self.call(Operation::global_market()).await?.data {
            MarketData::Global(global) => Ok(global),
            other => Err(unexpected("global", &other)),
        }
    }

    /// Exchange rates of coins against currencies
    pub async fn simple_prices<I, J, S, T>(
        &self,
        coin_ids: I,
        currencies: J,
    ) -> Result<SimplePrices, SchedulerError>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        match self
            .call(Operation::simple_prices(coin_ids, currencies))
            .await?
            .data
        {
            MarketData::Prices(prices) => Ok(prices),
            other => Err(unexpected("prices", &other)),
        }
    }

    /// Empties the cache and resets the rate window
    ///
    /// Administrative: meant for test harnesses and manual recovery.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        self.governor.reset();
        tracing::info!("Cache and rate window cleared");
    }

    /// Returns the name of the current provider
    pub fn provider_name(&self) -> &str {
        self.provider_name
    }

    /// Gets provider metrics including latency percentiles and success rates
    pub async fn provider_metrics(&self) -> ProviderMetrics {
        self.metrics.get_metrics().await
    }

    /// Current rate window counters
    pub fn governor_snapshot(&self) -> GovernorSnapshot {
        self.governor.snapshot()
    }

    /// Perform a health check on the scheduler
    ///
    /// Healthy while the provider answers, Degraded while any of the last 100
    /// calls fell back or a rate-limit penalty is pending, Unhealthy when every
    /// call so far fell back.
    pub async fn health_check(&self) -> ComponentHealth {
        let metrics = self.provider_metrics().await;
        let governor = self.governor_snapshot();
        let mut details = std::collections::HashMap::new();

        details.insert(
            "provider_name".to_string(),
            serde_json::json!(self.provider_name()),
        );
        details.insert(
            "cache_entries".to_string(),
            serde_json::json!(self.cache.len().await),
        );
        details.insert(
            "queued_requests".to_string(),
            serde_json::json!(self.queue.len()),
        );
        details.insert(
            "calls_in_window".to_string(),
            serde_json::json!(governor.count_in_window),
        );
        details.insert(
            "rate_limit_penalty_ms".to_string(),
            serde_json::json!(governor.penalty_remaining.map(|d| d.as_millis() as u64)),
        );
        details.insert(
            "success_rate".to_string(),
            serde_json::json!(metrics.success_rate),
        );
        details.insert(
            "recent_failures".to_string(),
            serde_json::json!(metrics.recent_failures),
        );

        let status = if metrics.total_requests > 0 && metrics.failed_requests == metrics.total_requests
        {
            HealthStatus::Unhealthy
        } else if metrics.recent_failures > 0 || governor.penalty_remaining.is_some() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Provider is answering with live data".to_string(),
            HealthStatus::Degraded => format!(
                "Serving fallback data for some requests (success rate {:.0}%)",
                metrics.success_rate * 100.0
            ),
            HealthStatus::Unhealthy => "Every provider call has fallen back".to_string(),
        };

        ComponentHealth {
            name: "market_data_scheduler".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }
}

fn unexpected(expected: &str, got: &MarketData) -> SchedulerError {
    let got = match got {
        MarketData::Markets(_) => "markets",
        MarketData::Chart(_) => "chart",
        MarketData::Global(_) => "global",
        MarketData::Prices(_) => "prices",
    };
    SchedulerError::internal(format!("expected {} payload, got {}", expected, got))
}
