use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use std::collections::HashMap;

use crate::error::{PricingError, Result};
use crate::models::{
    ConsumptionSeries, MergeStrategy, MergedRecord, NormalizedRateSeries, PricedTable,
};

/// Inner join of consumption readings against rates on the `on` timestamp column.
pub fn merge(
    consumption: &ConsumptionSeries,
    rates: &NormalizedRateSeries,
    on: &str,
) -> Result<PricedTable> {
    merge_with(consumption, rates, on, MergeStrategy::Inner)
}

/// Join consumption readings against rates on exact timestamp equality.
///
/// Consumption order is preserved. What happens to readings without a rate at
/// their timestamp depends on `strategy`.
pub fn merge_with(
    consumption: &ConsumptionSeries,
    rates: &NormalizedRateSeries,
    on: &str,
    strategy: MergeStrategy,
) -> Result<PricedTable> {
    if consumption.timestamp_column != on {
        return Err(PricingError::Schema {
            column: on.to_string(),
            table: "consumption".to_string(),
        });
    }
    if rates.timestamp_column != on {
        return Err(PricingError::Schema {
            column: on.to_string(),
            table: "rates".to_string(),
        });
    }
    if consumption.value_column == rates.rate_column || consumption.value_column == on {
        return Err(PricingError::DuplicateColumn(consumption.value_column.clone()));
    }
    if rates.rate_column == on {
        return Err(PricingError::DuplicateColumn(rates.rate_column.clone()));
    }

    let rate_at: HashMap<DateTime<FixedOffset>, Option<f64>> = rates
        .records
        .iter()
        .map(|record| (record.timestamp, record.rate))
        .collect();

    let mut records = Vec::with_capacity(consumption.records.len());
    let mut unmatched = 0usize;

    for reading in &consumption.records {
        let rate = match rate_at.get(&reading.timestamp) {
            Some(rate) => *rate,
            None => {
                unmatched += 1;
                if strategy == MergeStrategy::Inner {
                    continue;
                }
                None
            }
        };

        records.push(MergedRecord {
            timestamp: reading.timestamp,
            value: reading.value,
            rate,
        });
    }

    if unmatched > 0 {
        match strategy {
            MergeStrategy::Inner => warn!(
                "Dropped {} of {} consumption readings without a matching rate",
                unmatched,
                consumption.records.len()
            ),
            MergeStrategy::KeepUnmatched => debug!(
                "Kept {} consumption readings without a matching rate",
                unmatched
            ),
        }
    }
    debug!("Merged {} rows", records.len());

    Ok(PricedTable {
        timestamp_column: on.to_string(),
        value_column: consumption.value_column.clone(),
        rate_column: rates.rate_column.clone(),
        records,
        plan_columns: Vec::new(),
    })
}
