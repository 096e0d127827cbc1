//! CoinGecko market data provider implementation

use crate::{
    config::SchedulerConfig,
    constants::{
        COINGECKO_GLOBAL_ENDPOINT, COINGECKO_MARKETS_ENDPOINT, COINGECKO_SIMPLE_PRICE_ENDPOINT,
    },
    error::ProviderError,
    operation::{ChartRange, Operation},
    provider::MarketDataProvider,
    types::{CoinMarket, GlobalMarket, MarketChart, MarketData, SimplePrices},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;

/// CoinGecko wraps `/global` in a `data` envelope
#[derive(Debug, Deserialize)]
struct GlobalEnvelope {
    data: GlobalMarket,
}

/// CoinGecko market data provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    /// Creates a new CoinGecko provider
    pub fn new(config: &SchedulerConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ProviderError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Builds the endpoint URL and query parameters for an operation
    fn build_request(&self, operation: &Operation) -> (String, Vec<(&'static str, String)>) {
        match operation {
            Operation::ListMarkets { currency, per_page } => (
                format!("{}{}", self.base_url, COINGECKO_MARKETS_ENDPOINT),
                vec![
                    ("vs_currency", currency.clone()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", per_page.to_string()),
                    ("page", "1".to_string()),
                    ("sparkline", "false".to_string()),
                    ("price_change_percentage", "24h".to_string()),
                ],
            ),
            Operation::MarketChart {
                coin_id,
                currency,
                days,
            } => {
                let mut query = vec![
                    ("vs_currency", currency.clone()),
                    ("days", days.as_str().to_string()),
                ];
                // Intraday granularity is chosen by the provider
                if *days != ChartRange::Day {
                    query.push(("interval", "daily".to_string()));
                }
                (
                    format!("{}/coins/{}/market_chart", self.base_url, coin_id),
                    query,
                )
            }
            Operation::GlobalMarket => (
                format!("{}{}", self.base_url, COINGECKO_GLOBAL_ENDPOINT),
                Vec::new(),
            ),
            Operation::SimplePrices {
                coin_ids,
                currencies,
            } => (
                format!("{}{}", self.base_url, COINGECKO_SIMPLE_PRICE_ENDPOINT),
                vec![
                    ("ids", join(coin_ids)),
                    ("vs_currencies", join(currencies)),
                ],
            ),
        }
    }

    /// Sends a GET and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, ProviderError> {
        tracing::debug!(url = %url, "Fetching from CoinGecko");

        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let response_text = response.text().await?;

        serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::Unknown(format!(
                "Failed to parse CoinGecko response: {}. Response: {}",
                e, response_text
            ))
        })
    }
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    async fn fetch(&self, operation: &Operation) -> Result<MarketData, ProviderError> {
        let (url, query) = self.build_request(operation);

        let data = match operation {
            Operation::ListMarkets { .. } => {
                MarketData::Markets(self.get_json::<Vec<CoinMarket>>(&url, &query).await?)
            }
            Operation::MarketChart { .. } => {
                MarketData::Chart(self.get_json::<MarketChart>(&url, &query).await?)
            }
            Operation::GlobalMarket => {
                MarketData::Global(self.get_json::<GlobalEnvelope>(&url, &query).await?.data)
            }
            Operation::SimplePrices { .. } => {
                MarketData::Prices(self.get_json::<SimplePrices>(&url, &query).await?)
            }
        };

        tracing::debug!(operation = operation.name(), "Successfully fetched from CoinGecko");

        Ok(data)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
