//! Synthetic market data served when the provider is unavailable
//!
//! Every generator returns the same shape a live response for the operation
//! would have, with plausible magnitudes. Values are deterministic for a given
//! operation; only chart timestamps follow the wall clock.

use crate::{
    operation::{ChartRange, Operation},
    types::{CoinMarket, GlobalMarket, MarketChart, MarketData, SimplePrices},
};
use chrono::Utc;
use std::collections::BTreeMap;

/// Reference coin used for listings and price lookups
struct ReferenceCoin {
    id: &'static str,
    symbol: &'static str,
    name: &'static str,
    image_url: &'static str,
    price_usd: f64,
    market_cap_usd: f64,
    change_pct_24h: f64,
}

const REFERENCE_COINS: &[ReferenceCoin] = &[
    ReferenceCoin {
        id: "bitcoin",
        symbol: "btc",
        name: "Bitcoin",
        image_url: "https://assets.coingecko.com/coins/images/1/large/bitcoin.png",
        price_usd: 95_000.0,
        market_cap_usd: 1_850_000_000_000.0,
        change_pct_24h: 2.5,
    },
    ReferenceCoin {
        id: "ethereum",
        symbol: "eth",
        name: "Ethereum",
        image_url: "https://assets.coingecko.com/coins/images/279/large/ethereum.png",
        price_usd: 3_200.0,
        market_cap_usd: 385_000_000_000.0,
        change_pct_24h: 1.8,
    },
    ReferenceCoin {
        id: "tether",
        symbol: "usdt",
        name: "Tether",
        image_url: "https://assets.coingecko.com/coins/images/325/large/Tether.png",
        price_usd: 1.0,
        market_cap_usd: 95_000_000_000.0,
        change_pct_24h: 0.01,
    },
];

const GLOBAL_MARKET_CAP_USD: f64 = 2_500_000_000_000.0;
const GLOBAL_VOLUME_USD: f64 = 95_000_000_000.0;

/// Price of one unit of a coin not in the reference table
const UNKNOWN_COIN_PRICE_USD: f64 = 1.0;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Units of `currency` per US dollar
fn usd_rate(currency: &str) -> f64 {
    match currency {
        "eur" => 0.92,
        "gbp" => 0.79,
        "inr" => 83.2,
        "jpy" => 150.0,
        _ => 1.0,
    }
}

fn reference_price_usd(coin_id: &str) -> f64 {
    REFERENCE_COINS
        .iter()
        .find(|c| c.id == coin_id)
        .map(|c| c.price_usd)
        .unwrap_or(UNKNOWN_COIN_PRICE_USD)
}

/// Builds fallback data for `operation`
pub fn synthesize(operation: &Operation) -> MarketData {
    match operation {
        Operation::ListMarkets { currency, per_page } => {
            MarketData::Markets(markets(currency, *per_page))
        }
        Operation::MarketChart {
            coin_id,
            currency,
            days,
        } => MarketData::Chart(chart(coin_id, currency, *days)),
        Operation::GlobalMarket => MarketData::Global(global()),
        Operation::SimplePrices {
            coin_ids,
            currencies,
        } => {
            let prices: SimplePrices = coin_ids
                .iter()
                .map(|id| {
                    let rates = currencies
                        .iter()
                        .map(|c| (c.clone(), reference_price_usd(id) * usd_rate(c)))
                        .collect::<BTreeMap<_, _>>();
                    (id.clone(), rates)
                })
                .collect();
            MarketData::Prices(prices)
        }
    }
}

fn markets(currency: &str, per_page: u32) -> Vec<CoinMarket> {
    let rate = usd_rate(currency);
    REFERENCE_COINS
        .iter()
        .take(per_page as usize)
        .map(|coin| CoinMarket {
            id: coin.id.to_string(),
            symbol: coin.symbol.to_string(),
            name: coin.name.to_string(),
            image_url: coin.image_url.to_string(),
            current_price: Some(coin.price_usd * rate),
            market_cap: Some(coin.market_cap_usd * rate),
            price_change_pct_24h: Some(coin.change_pct_24h),
        })
        .collect()
}

/// Hourly points for one day, daily points otherwise, ending now
fn chart(coin_id: &str, currency: &str, days: ChartRange) -> MarketChart {
    let (points, step_ms) = match days {
        ChartRange::Day => (24, HOUR_MS),
        other => (other.days() as i64, DAY_MS),
    };
    let base = reference_price_usd(coin_id) * usd_rate(currency);
    let seed = coin_id.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let phase = (seed % 360) as f64;
    let now = Utc::now().timestamp_millis();

    let prices = (0..=points)
        .map(|i| {
            let timestamp = now - (points - i) * step_ms;
            // +/-5% around the reference price
            let wave = ((i as f64) * 0.7 + phase).sin() * 0.05;
            (timestamp, base * (1.0 + wave))
        })
        .collect();

    MarketChart { prices }
}

fn global() -> GlobalMarket {
    let by_currency = |usd: f64| {
        ["usd", "eur", "gbp"]
            .iter()
            .map(|c| (c.to_string(), usd * usd_rate(c)))
            .collect::<BTreeMap<_, _>>()
    };
    GlobalMarket {
        total_market_cap_by_currency: by_currency(GLOBAL_MARKET_CAP_USD),
        total_volume_by_currency: by_currency(GLOBAL_VOLUME_USD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markets_respect_page_size_and_currency() {
        let MarketData::Markets(rows) = synthesize(&Operation::list_markets("eur", 2)) else {
            panic!("expected markets payload");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "bitcoin");
        assert!((rows[0].current_price.unwrap() - 87_400.0).abs() < 1e-6);
        assert!(rows.iter().all(|r| r.market_cap.is_some_and(|cap| cap > 0.0)));
    }

    #[test]
    fn test_chart_shape_per_range() {
        let MarketData::Chart(day) =
            synthesize(&Operation::market_chart("bitcoin", "usd", ChartRange::Day))
        else {
            panic!("expected chart payload");
        };
        assert_eq!(day.prices.len(), 25);
        assert_eq!(day.prices[1].0 - day.prices[0].0, HOUR_MS);

        let MarketData::Chart(week) =
            synthesize(&Operation::market_chart("ethereum", "usd", ChartRange::Week))
        else {
            panic!("expected chart payload");
        };
        assert_eq!(week.prices.len(), 8);
        assert!(week.prices.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(week
            .prices
            .iter()
            .all(|(_, p)| *p >= 3_200.0 * 0.95 && *p <= 3_200.0 * 1.05));
    }

    #[test]
    fn test_simple_prices_cover_every_pair() {
        let op = Operation::simple_prices(["bitcoin", "dogecoin"], ["usd", "inr"]);
        let MarketData::Prices(prices) = synthesize(&op) else {
            panic!("expected prices payload");
        };
        assert_eq!(prices.len(), 2);
        assert_eq!(prices["bitcoin"]["usd"], 95_000.0);
        assert_eq!(prices["dogecoin"]["inr"], 83.2);
        assert_eq!(synthesize(&op), MarketData::Prices(prices));
    }

    #[test]
    fn test_global_has_usd_totals() {
        let MarketData::Global(global) = synthesize(&Operation::global_market()) else {
            panic!("expected global payload");
        };
        assert_eq!(global.total_market_cap_by_currency["usd"], GLOBAL_MARKET_CAP_USD);
        assert_eq!(global.total_volume_by_currency["usd"], GLOBAL_VOLUME_USD);
    }
}
