//! Logical provider operations and their cache keys

use crate::{constants::MAX_PER_PAGE, error::SchedulerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Chart history length accepted by `market-chart`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartRange {
    #[serde(rename = "1")]
    Day,
    #[serde(rename = "7")]
    Week,
    #[serde(rename = "30")]
    Month,
    #[serde(rename = "90")]
    Quarter,
    #[serde(rename = "365")]
    Year,
}

impl ChartRange {
    /// Value sent as the provider's `days` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartRange::Day => "1",
            ChartRange::Week => "7",
            ChartRange::Month => "30",
            ChartRange::Quarter => "90",
            ChartRange::Year => "365",
        }
    }

    pub fn days(&self) -> u32 {
        match self {
            ChartRange::Day => 1,
            ChartRange::Week => 7,
            ChartRange::Month => 30,
            ChartRange::Quarter => 90,
            ChartRange::Year => 365,
        }
    }
}

impl FromStr for ChartRange {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(ChartRange::Day),
            "7" => Ok(ChartRange::Week),
            "30" => Ok(ChartRange::Month),
            "90" => Ok(ChartRange::Quarter),
            "365" => Ok(ChartRange::Year),
            other => Err(SchedulerError::invalid(format!(
                "unsupported chart range '{}', expected one of 1, 7, 30, 90, 365",
                other
            ))),
        }
    }
}

/// Cache key of an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the four logical requests the dashboard makes
///
/// Identifier-like parameters are lower-cased on construction and set-valued
/// parameters are ordered sets, so two operations built from the same values
/// in any order compare equal and share a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    ListMarkets {
        currency: String,
        per_page: u32,
    },
    MarketChart {
        coin_id: String,
        currency: String,
        days: ChartRange,
    },
    GlobalMarket,
    SimplePrices {
        coin_ids: BTreeSet<String>,
        currencies: BTreeSet<String>,
    },
}

impl Operation {
    pub fn list_markets(currency: &str, per_page: u32) -> Self {
        Operation::ListMarkets {
            currency: normalize(currency),
            per_page,
        }
    }

    pub fn market_chart(coin_id: &str, currency: &str, days: ChartRange) -> Self {
        Operation::MarketChart {
            coin_id: normalize(coin_id),
            currency: normalize(currency),
            days,
        }
    }

    pub fn global_market() -> Self {
        Operation::GlobalMarket
    }

    pub fn simple_prices<I, J, S, T>(coin_ids: I, currencies: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Operation::SimplePrices {
            coin_ids: coin_ids.into_iter().map(|s| normalize(s.as_ref())).collect(),
            currencies: currencies.into_iter().map(|s| normalize(s.as_ref())).collect(),
        }
    }

    /// Short operation name, also the cache key prefix
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListMarkets { .. } => "markets",
            Operation::MarketChart { .. } => "chart",
            Operation::GlobalMarket => "global",
            Operation::SimplePrices { .. } => "prices",
        }
    }

    /// Rejects malformed input before it reaches the cache or the queue
    pub fn validate(&self) -> Result<(), SchedulerError> {
        match self {
            Operation::ListMarkets { currency, per_page } => {
                check_identifier("currency", currency)?;
                if *per_page == 0 || *per_page > MAX_PER_PAGE {
                    return Err(SchedulerError::invalid(format!(
                        "per_page must be between 1 and {}, got {}",
                        MAX_PER_PAGE, per_page
                    )));
                }
                Ok(())
            }
            Operation::MarketChart {
                coin_id, currency, ..
            } => {
                check_identifier("coin_id", coin_id)?;
                check_identifier("currency", currency)
            }
            Operation::GlobalMarket => Ok(()),
            Operation::SimplePrices {
                coin_ids,
                currencies,
            } => {
                if coin_ids.is_empty() {
                    return Err(SchedulerError::invalid("coin_ids must not be empty"));
                }
                if currencies.is_empty() {
                    return Err(SchedulerError::invalid("currencies must not be empty"));
                }
                coin_ids
                    .iter()
                    .try_for_each(|id| check_identifier("coin_id", id))?;
                currencies
                    .iter()
                    .try_for_each(|c| check_identifier("currency", c))
            }
        }
    }

    /// Deterministic key: operation name followed by its parameters sorted by name
    pub fn cache_key(&self) -> CacheKey {
        let mut params: Vec<(&str, String)> = match self {
            Operation::ListMarkets { currency, per_page } => {
                vec![("currency", currency.clone()), ("per_page", per_page.to_string())]
            }
            Operation::MarketChart {
                coin_id,
                currency,
                days,
            } => vec![
                ("coin_id", coin_id.clone()),
                ("currency", currency.clone()),
                ("days", days.as_str().to_string()),
            ],
            Operation::GlobalMarket => Vec::new(),
            Operation::SimplePrices {
                coin_ids,
                currencies,
            } => vec![
                ("coin_ids", join(coin_ids)),
                ("currencies", join(currencies)),
            ],
        };
        params.sort_by(|a, b| a.0.cmp(b.0));

        if params.is_empty() {
            return CacheKey(self.name().to_string());
        }

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        CacheKey(format!("{}?{}", self.name(), query))
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

fn check_identifier(field: &str, value: &str) -> Result<(), SchedulerError> {
    if value.is_empty() {
        return Err(SchedulerError::invalid(format!("{} must not be empty", field)));
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(SchedulerError::invalid(format!(
            "{} '{}' contains unsupported characters",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_discriminates_page_size() {
        let a = Operation::list_markets("usd", 50).cache_key();
        let b = Operation::list_markets("usd", 100).cache_key();
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "markets?currency=usd&per_page=50");
    }

    #[test]
    fn test_key_ignores_set_presentation_order() {
        let a = Operation::simple_prices(["ethereum", "bitcoin"], ["usd", "eur"]);
        let b = Operation::simple_prices(["bitcoin", "ethereum"], ["eur", "usd"]);
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(
            a.cache_key().as_str(),
            "prices?coin_ids=bitcoin,ethereum&currencies=eur,usd"
        );
    }

    #[test]
    fn test_key_normalizes_case() {
        assert_eq!(
            Operation::market_chart("Bitcoin", "USD", ChartRange::Week).cache_key(),
            Operation::market_chart("bitcoin", "usd", ChartRange::Week).cache_key()
        );
    }

    #[test]
    fn test_keys_differ_across_operations() {
        let chart_day = Operation::market_chart("bitcoin", "usd", ChartRange::Day).cache_key();
        let chart_week = Operation::market_chart("bitcoin", "usd", ChartRange::Week).cache_key();
        assert_ne!(chart_day, chart_week);
        assert_eq!(Operation::global_market().cache_key().as_str(), "global");
    }

    #[test]
    fn test_chart_range_parsing() {
        assert_eq!("30".parse::<ChartRange>().unwrap(), ChartRange::Month);
        assert_eq!(" 365 ".parse::<ChartRange>().unwrap().days(), 365);
        assert!(matches!(
            "14".parse::<ChartRange>(),
            Err(SchedulerError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_malformed_input() {
        assert!(Operation::list_markets("usd", 0).validate().is_err());
        assert!(Operation::list_markets("usd", 251).validate().is_err());
        assert!(Operation::list_markets("", 10).validate().is_err());
        assert!(Operation::market_chart("bit coin", "usd", ChartRange::Day)
            .validate()
            .is_err());
        assert!(Operation::simple_prices(Vec::<&str>::new(), ["usd"])
            .validate()
            .is_err());
        assert!(Operation::simple_prices(["bitcoin"], ["usd&x=1"])
            .validate()
            .is_err());

        assert!(Operation::list_markets("usd", 250).validate().is_ok());
        assert!(Operation::global_market().validate().is_ok());
        assert!(Operation::simple_prices(["usd-coin"], ["eur"]).validate().is_ok());
    }
}
