use market_data_scheduler::{ChartRange, DataSource, Operation, Scheduler, SchedulerConfig};
use std::time::Instant;

fn describe(source: DataSource) -> String {
    match source {
        DataSource::Live => "live".to_string(),
        DataSource::Fallback { reason } => format!("fallback ({:?})", reason),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("market_data_scheduler=info".parse()?),
        )
        .init();

    let scheduler = Scheduler::new(SchedulerConfig::from_env())?;
    println!("Dashboard snapshot (provider: {})", scheduler.provider_name());
    println!("-------------------------------------------");

    // The four requests a dashboard page makes on load. They share one queue,
    // so they reach the provider at least two seconds apart.
    let week: ChartRange = "7".parse()?;
    let started = Instant::now();
    let (markets, chart, global, prices) = tokio::join!(
        scheduler.call(Operation::list_markets("usd", 10)),
        scheduler.call(Operation::market_chart("bitcoin", "usd", week)),
        scheduler.call(Operation::global_market()),
        scheduler.call(Operation::simple_prices(
            ["bitcoin", "ethereum"],
            ["usd", "eur", "gbp"]
        )),
    );

    for (label, response) in [
        ("markets", markets?),
        ("chart", chart?),
        ("global", global?),
        ("prices", prices?),
    ] {
        println!("{:<8} {}", label, describe(response.source));
    }
    println!("Cold load took {:?}", started.elapsed());

    // A second load is answered from the cache
    let started = Instant::now();
    let coins = scheduler.list_markets("usd", 10).await?;
    println!("Warm load took {:?}", started.elapsed());
    for coin in coins.iter().take(5) {
        println!(
            "   {:<6} {:>14.2} {:>8.2}%",
            coin.symbol.to_uppercase(),
            coin.current_price.unwrap_or_default(),
            coin.price_change_pct_24h.unwrap_or_default()
        );
    }

    let health = scheduler.health_check().await;
    println!("-------------------------------------------");
    println!(
        "Health: {:?} - {}",
        health.status,
        health.message.unwrap_or_default()
    );

    Ok(())
}
