use chrono::{DateTime, Duration};
use tariff_calculator::models::SmpEntry;
use tariff_calculator::{
    monthly_summary, ConsumptionRecord, ConsumptionSeries, PipelineConfig, RawPriceDay,
    TariffCalculator,
};

fn main() -> tariff_calculator::Result<()> {
    // One day of half-hourly day-ahead prices, cheap at night and expensive in the evening
    let feed = vec![RawPriceDay {
        date: "15/01/2024".to_string(),
        entries: (0..48)
            .map(|slot| {
                let hour = slot / 2;
                let price = match hour {
                    0..=6 | 23 => 180.0,
                    17..=22 => 420.0,
                    _ => 290.0,
                };
                SmpEntry {
                    time: format!("{:02}:{:02}", hour, (slot % 2) * 30),
                    day_ahead_price: Some(price),
                }
            })
            .collect(),
    }];

    // A flat 0.3 kWh every 15 minutes
    let start = DateTime::parse_from_rfc3339("2024-01-15T00:00:00+03:00").unwrap();
    let usage = ConsumptionSeries::new(
        (0..96)
            .map(|i| ConsumptionRecord {
                timestamp: start + Duration::minutes(15 * i),
                value: 0.3,
            })
            .collect(),
    );

    let calculator = TariffCalculator::new(PipelineConfig::default());
    let table = calculator.calculate(&feed, &usage)?;

    println!("Tariff Plan Comparison");
    println!("======================");
    println!("Readings priced: {}", table.len());
    println!();
    for column in table.plan_columns() {
        let total: f64 = column.values.iter().sum();
        println!("  {:<22} {:>8.3}", column.name, total);
    }

    println!();
    println!("{}", monthly_summary(&table)?);
    Ok(())
}
