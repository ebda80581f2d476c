use chrono::{DateTime, Duration};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tariff_calculator::models::SmpEntry;
use tariff_calculator::{
    ConsumptionRecord, ConsumptionSeries, PipelineConfig, RawPriceDay, TariffCalculator,
};

/// A month of half-hourly feed entries.
fn month_of_feed() -> Vec<RawPriceDay> {
    (1..=30)
        .map(|day| RawPriceDay {
            date: format!("{day:02}/04/2024"),
            entries: (0..48)
                .map(|slot| SmpEntry {
                    time: format!("{:02}:{:02}", slot / 2, (slot % 2) * 30),
                    day_ahead_price: Some(200.0 + f64::from(slot) * 3.5),
                })
                .collect(),
        })
        .collect()
}

fn month_of_usage() -> ConsumptionSeries {
    let start = DateTime::parse_from_rfc3339("2024-04-01T00:00:00+03:00").unwrap();
    ConsumptionSeries::new(
        (0..30 * 96)
            .map(|i| ConsumptionRecord {
                timestamp: start + Duration::minutes(15 * i),
                value: 0.1 + (i % 7) as f64 * 0.05,
            })
            .collect(),
    )
}

fn benchmark_normalize(c: &mut Criterion) {
    let calculator = TariffCalculator::new(PipelineConfig::default());
    let feed = month_of_feed();

    c.bench_function("normalize_month", |b| {
        b.iter(|| black_box(calculator.normalize_rates(&feed)))
    });
}

fn benchmark_price(c: &mut Criterion) {
    let calculator = TariffCalculator::new(PipelineConfig::default());
    let rates = calculator.normalize_rates(&month_of_feed()).unwrap();
    let usage = month_of_usage();

    c.bench_function("price_month_all_plans", |b| {
        b.iter(|| black_box(calculator.price(&usage, &rates)))
    });
}

criterion_group!(benches, benchmark_normalize, benchmark_price);
criterion_main!(benches);
