//! # Market Data Scheduler
//!
//! Mediates every call a market dashboard makes to CoinGecko under the
//! provider's shared rate budget.
//!
//! ## Usage
//!
//! Construct one scheduler per process and share clones of it:
//!
//! ```no_run
//! use market_data_scheduler::{Scheduler, SchedulerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::new(SchedulerConfig::from_env())?;
//!
//! let global = scheduler.global_market().await?;
//! println!("Total market cap: {:?}", global.total_market_cap_by_currency.get("usd"));
//!
//! let chart = scheduler.market_chart("bitcoin", "usd", "7").await?;
//! println!("{} chart points", chart.prices.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Scheduler::call(operation)
//!     ↓ fresh?  ──────────────→ CacheStore (60s TTL)
//!     ↓ miss
//! RequestQueue (FIFO, single worker)
//!     ↓
//! Governor::admit (2s spacing, 10 calls / 60s, 5s penalty after 429)
//!     ↓
//! Fetcher (20s timeout) → MarketDataProvider (CoinGecko)
//!     ↓ failure
//! fallback::synthesize → cached like live data
//! ```
//!
//! ## Error Handling
//!
//! Provider failures never reach callers. A failed call is answered with
//! synthetic data of the same shape, and the response's `source` says so:
//!
//! ```no_run
//! use market_data_scheduler::{DataSource, Operation, Scheduler, SchedulerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::new(SchedulerConfig::default())?;
//! let response = scheduler.call(Operation::list_markets("usd", 50)).await?;
//! if let DataSource::Fallback { reason } = response.source {
//!     println!("showing placeholder data ({:?})", reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Only malformed input (`SchedulerError::InvalidOperation`) is returned as an error.

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod fallback;
pub(crate) mod fetcher;
pub mod governor;
pub mod metrics;
pub mod operation;
pub mod provider;
pub mod providers;
pub(crate) mod queue;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use config::{RateBudget, SchedulerConfig};
pub use error::{FailureKind, ProviderError, SchedulerError};
pub use metrics::ProviderMetrics;
pub use operation::{CacheKey, ChartRange, Operation};
pub use provider::MarketDataProvider;
pub use scheduler::Scheduler;
pub use types::{
    CoinMarket, ComponentHealth, DataSource, GlobalMarket, HealthStatus, MarketChart, MarketData,
    MarketResponse, SimplePrices,
};
