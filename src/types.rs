//! Types for the market data scheduler

use crate::error::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a ranked market listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinMarket {
    /// Provider coin id (e.g. "bitcoin")
    pub id: String,
    /// Ticker symbol, lower case as the provider reports it
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Logo URL
    #[serde(rename = "image")]
    pub image_url: String,
    /// Price in the requested currency, absent for coins without price data
    pub current_price: Option<f64>,
    /// Market capitalisation in the requested currency, absent when unknown
    pub market_cap: Option<f64>,
    /// 24h price change percentage, absent for freshly listed coins
    #[serde(rename = "price_change_percentage_24h")]
    pub price_change_pct_24h: Option<f64>,
}

/// Historical price series for one coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketChart {
    /// `(unix timestamp in ms, price)` pairs, oldest first
    pub prices: Vec<(i64, f64)>,
}

/// Aggregate market totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMarket {
    #[serde(rename = "total_market_cap")]
    pub total_market_cap_by_currency: BTreeMap<String, f64>,
    #[serde(rename = "total_volume")]
    pub total_volume_by_currency: BTreeMap<String, f64>,
}

/// `coin id -> (currency -> rate)`
pub type SimplePrices = BTreeMap<String, BTreeMap<String, f64>>;

/// Payload of any of the four operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MarketData {
    Markets(Vec<CoinMarket>),
    Chart(MarketChart),
    Global(GlobalMarket),
    Prices(SimplePrices),
}

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataSource {
    /// Fetched from the provider
    Live,
    /// Synthesized because the provider call failed
    Fallback { reason: FailureKind },
}

/// A scheduler answer: the data plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketResponse {
    pub data: MarketData,
    pub source: DataSource,
    /// When the provider call (or the fallback synthesis) happened
    pub fetched_at: DateTime<Utc>,
}

impl MarketResponse {
    pub fn live(data: MarketData) -> Self {
        Self {
            data,
            source: DataSource::Live,
            fetched_at: Utc::now(),
        }
    }

    pub fn fallback(data: MarketData, reason: FailureKind) -> Self {
        Self {
            data,
            source: DataSource::Fallback { reason },
            fetched_at: Utc::now(),
        }
    }

    /// Returns true if the data is synthetic
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, DataSource::Fallback { .. })
    }
}

/// Overall component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Provider answering with live data
    Healthy,
    /// Some calls are being served from fallback data
    Degraded,
    /// Every recent call fell back
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
