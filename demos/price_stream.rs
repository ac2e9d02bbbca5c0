use std::time::Duration;
use ticker_price_engine::{EngineConfig, PriceEngine, PriceRange};
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Ticker Price Engine Example");
    println!("===========================");

    let config = EngineConfig::from_env()?
        .with_tickers(["APPLE", "GOOGLE"])
        .with_price_range(PriceRange::new(90, 100)?);
    let engine = PriceEngine::start(config)?;

    let mut feed = engine.stream();
    let reader = tokio::spawn(async move {
        for _ in 0..6 {
            match feed.recv().await {
                Some(record) => println!(
                    "stream   {:<8} {:>6.2} ({})",
                    record.ticker(),
                    record.price(),
                    record.observed_at()
                ),
                None => break,
            }
        }
    });

    sleep(Duration::from_millis(2_500)).await;

    println!("\n{:-<50}", "");
    for ticker in engine.tickers() {
        match engine.snapshot(ticker).await {
            Ok(record) => println!(
                "snapshot {:<8} {:>6.2} (age: {:?})",
                ticker,
                record.price(),
                record.age()
            ),
            Err(e) => println!("snapshot {:<8} {}", ticker, e),
        }
    }
    println!("{:-<50}\n", "");

    reader.await?;

    let metrics = engine.metrics().await;
    println!(
        "cycles={} generations={} overruns={} subscribers={}",
        metrics.completed_cycles,
        metrics.total_generations,
        metrics.overrun_records,
        engine.subscriber_count()
    );

    engine.shutdown().await;
    Ok(())
}
