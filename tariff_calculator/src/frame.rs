use polars::prelude::*;

use crate::error::{PricingError, Result};
use crate::models::PricedTable;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";
pub const MONTH_COLUMN: &str = "month";

impl PricedTable {
    /// One row per record, columns in table order.
    pub fn to_data_frame(&self) -> Result<DataFrame> {
        let timestamps: Vec<String> = self
            .records
            .iter()
            .map(|r| r.timestamp.format(TIMESTAMP_FORMAT).to_string())
            .collect();
        let values: Vec<f64> = self.records.iter().map(|r| r.value).collect();
        let rates: Vec<Option<f64>> = self.records.iter().map(|r| r.rate).collect();

        let mut columns = vec![
            Series::new(self.timestamp_column.as_str().into(), timestamps),
            Series::new(self.value_column.as_str().into(), values),
            Series::new(self.rate_column.as_str().into(), rates),
        ];
        for plan in &self.plan_columns {
            columns.push(Series::new(plan.name.as_str().into(), &plan.values));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Sum consumption and every plan column per calendar month.
///
/// Months are taken in each timestamp's own offset and keep the order in
/// which they first appear. The rate column is not summed.
pub fn monthly_summary(table: &PricedTable) -> Result<DataFrame> {
    if table.has_column(MONTH_COLUMN) {
        return Err(PricingError::DuplicateColumn(MONTH_COLUMN.to_string()));
    }

    let months: Vec<String> = table
        .records()
        .iter()
        .map(|r| r.timestamp.format("%Y-%m").to_string())
        .collect();

    let mut df = table.to_data_frame()?;
    df.with_column(Series::new(MONTH_COLUMN.into(), months))?;

    let mut sums = vec![col(table.value_column()).sum()];
    sums.extend(table.plan_columns().iter().map(|c| col(c.name.as_str()).sum()));

    let summary = df
        .lazy()
        .group_by_stable([col(MONTH_COLUMN)])
        .agg(sums)
        .collect()?;

    Ok(summary)
}
