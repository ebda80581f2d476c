use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

use crate::error::{PricingError, Result};
use crate::models::{NormalizedRateSeries, PipelineConfig, PriceRecord, RawPriceDay};

/// Day-first formats first, ISO last.
const FEED_DATE_FORMATS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];
const FEED_TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

pub struct RateNormalizer {
    offset: FixedOffset,
    step: Duration,
    rate_divisor: f64,
    timestamp_column: String,
    rate_column: String,
}

impl RateNormalizer {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        if config.rate_divisor == 0.0 || !config.rate_divisor.is_finite() {
            return Err(PricingError::InvalidConfig(format!(
                "rate divisor must be a non-zero number, got {}",
                config.rate_divisor
            )));
        }

        Ok(Self {
            offset: config.offset()?,
            step: config.step()?,
            rate_divisor: config.rate_divisor,
            timestamp_column: config.timestamp_column.clone(),
            rate_column: config.rate_column.clone(),
        })
    }

    /// Turn the published day-ahead feed into a uniform rate series in currency per kWh.
    pub fn normalize(&self, raw_days: &[RawPriceDay]) -> Result<NormalizedRateSeries> {
        let records = self.flatten(raw_days)?;
        debug!("Flattened {} feed entries from {} days", records.len(), raw_days.len());

        let records: Vec<PriceRecord> = resample_forward_fill(&records, self.step)?
            .into_iter()
            .map(|record| PriceRecord {
                rate: record.rate.map(|rate| rate / self.rate_divisor),
                ..record
            })
            .collect();
        debug!("Resampled to {} grid points", records.len());

        Ok(NormalizedRateSeries {
            timestamp_column: self.timestamp_column.clone(),
            rate_column: self.rate_column.clone(),
            records,
        })
    }

    /// Combine each entry's time with its day's date, localized to the feed offset.
    fn flatten(&self, raw_days: &[RawPriceDay]) -> Result<Vec<PriceRecord>> {
        let mut records = Vec::new();

        for day in raw_days {
            let date = parse_feed_date(&day.date)?;
            for entry in &day.entries {
                let time = parse_feed_time(&entry.time)?;
                records.push(PriceRecord {
                    timestamp: localize(date.and_time(time), self.offset)?,
                    rate: entry.day_ahead_price,
                });
            }
        }

        Ok(records)
    }
}

/// Parse a feed date, reading ambiguous dates day first. Any time part is ignored.
pub fn parse_feed_date(value: &str) -> Result<NaiveDate> {
    let date = value
        .trim()
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or_default();

    FEED_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
        .ok_or_else(|| PricingError::InvalidTimestamp {
            value: value.to_string(),
            reason: "expected a day-first date such as 31/01/2024".to_string(),
        })
}

pub fn parse_feed_time(value: &str) -> Result<NaiveTime> {
    FEED_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value.trim(), format).ok())
        .ok_or_else(|| PricingError::InvalidTimestamp {
            value: value.to_string(),
            reason: "expected HH:MM or HH:MM:SS".to_string(),
        })
}

pub(crate) fn localize(
    naive: NaiveDateTime,
    offset: FixedOffset,
) -> Result<DateTime<FixedOffset>> {
    naive
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| PricingError::InvalidTimestamp {
            value: naive.to_string(),
            reason: format!("not representable at offset {offset}"),
        })
}

/// Rebuild `records` on a grid of `step` from the earliest to the latest timestamp.
///
/// Each grid point takes the latest known rate at or before it. Points before
/// the first known rate stay undefined. Input order does not matter, but two
/// records on the same instant are rejected.
pub fn resample_forward_fill(records: &[PriceRecord], step: Duration) -> Result<Vec<PriceRecord>> {
    if step <= Duration::zero() {
        return Err(PricingError::InvalidConfig(format!(
            "grid step must be positive, got {step}"
        )));
    }

    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| record.timestamp);

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].timestamp == pair[1].timestamp) {
        return Err(PricingError::DuplicateTimestamp(pair[1].timestamp));
    }

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Err(PricingError::EmptyInput);
    };

    let mut grid = Vec::new();
    let mut known = sorted.iter().peekable();
    let mut current_rate = None;
    let mut timestamp = first.timestamp;

    while timestamp <= last.timestamp {
        while let Some(record) = known.next_if(|record| record.timestamp <= timestamp) {
            if record.rate.is_some() {
                current_rate = record.rate;
            }
        }

        grid.push(PriceRecord {
            timestamp,
            rate: current_rate,
        });
        timestamp += step;
    }

    Ok(grid)
}
