//! Constants for the market data scheduler
//!
//! These are the compile-time defaults. `SchedulerConfig` carries them at
//! runtime and allows overrides for tests and alternate deployments.

/// How long a cached response stays fresh (in seconds)
pub const CACHE_TTL_SECS: u64 = 60;

/// Minimum spacing between two provider calls (in milliseconds)
pub const MIN_REQUEST_INTERVAL_MS: u64 = 2000;

/// Maximum provider calls admitted per rate window
pub const MAX_REQUESTS_PER_WINDOW: u32 = 10;

/// Length of the rate accounting window (in seconds)
pub const RATE_WINDOW_SECS: u64 = 60;

/// Extra suspension applied after the provider answers with HTTP 429 (in milliseconds)
pub const RATE_LIMIT_PENALTY_MS: u64 = 5000;

/// HTTP request timeout when calling the provider (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Largest page CoinGecko serves for `/coins/markets`
pub const MAX_PER_PAGE: u32 = 250;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko endpoint for ranked market listings
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// CoinGecko endpoint for aggregate market data
pub const COINGECKO_GLOBAL_ENDPOINT: &str = "/global";

/// CoinGecko endpoint for simple price queries
pub const COINGECKO_SIMPLE_PRICE_ENDPOINT: &str = "/simple/price";

/// Environment variable overriding the provider base URL
pub const API_URL_ENV: &str = "MARKET_DATA_API_URL";

/// Environment variable overriding the request timeout in seconds
pub const REQUEST_TIMEOUT_ENV: &str = "MARKET_DATA_REQUEST_TIMEOUT_SECS";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "market-data-scheduler/0.1.0";
