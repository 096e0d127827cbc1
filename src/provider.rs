//! Provider abstraction for fetching market data from an external API

use crate::{error::ProviderError, operation::Operation, types::MarketData};
use async_trait::async_trait;

/// Trait for market data providers
///
/// An implementation performs exactly one remote call per `fetch` and
/// classifies any failure into [`ProviderError`]. Rate limiting, caching and
/// fallback are handled by the scheduler around it.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Performs the remote call for `operation`
    ///
    /// # Returns
    /// The decoded payload, shaped after the operation's kind
    async fn fetch(&self, operation: &Operation) -> Result<MarketData, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}
