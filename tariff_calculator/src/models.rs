use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{PricingError, Result};
use crate::tariff::{standard_plans, TariffPlan};

pub const DEFAULT_TIMESTAMP_COLUMN: &str = "date";
pub const DEFAULT_VALUE_COLUMN: &str = "value";
pub const DEFAULT_RATE_COLUMN: &str = "noga_rate_nis_to_kwh";

/// Everything the pipeline needs to know, passed explicitly to each entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub timestamp_column: String,
    pub value_column: String,
    pub rate_column: String,
    pub utc_offset_hours: i32, // Israel standard time, no DST
    pub step_minutes: i64,
    pub rate_divisor: f64, // feed unit -> currency per kWh
    pub merge_strategy: MergeStrategy,
    pub plans: Vec<TariffPlan>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            rate_column: DEFAULT_RATE_COLUMN.to_string(),
            utc_offset_hours: 3,
            step_minutes: 15,
            rate_divisor: 1000.0,
            merge_strategy: MergeStrategy::Inner,
            plans: standard_plans(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing keys fall back to the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value that is only interpreted later in the pipeline.
    pub fn validate(&self) -> Result<()> {
        self.offset()?;
        self.step()?;
        for plan in &self.plans {
            plan.validate()?;
        }
        Ok(())
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                PricingError::InvalidConfig(format!(
                    "UTC offset of {} hours is out of range",
                    self.utc_offset_hours
                ))
            })
    }

    pub fn step(&self) -> Result<Duration> {
        if self.step_minutes <= 0 {
            return Err(PricingError::InvalidConfig(format!(
                "grid step must be positive, got {} minutes",
                self.step_minutes
            )));
        }
        Duration::try_minutes(self.step_minutes).ok_or_else(|| {
            PricingError::InvalidConfig(format!(
                "grid step of {} minutes is out of range",
                self.step_minutes
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Drop consumption rows without a matching rate.
    #[default]
    Inner,
    /// Keep every consumption row, unmatched ones get an undefined rate.
    KeepUnmatched,
}

/// One calendar day of the day-ahead price feed, as published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPriceDay {
    pub date: String,
    #[serde(rename = "smpData")]
    pub entries: Vec<SmpEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmpEntry {
    pub time: String,
    #[serde(rename = "day_Ahead_Constrained_Smp")]
    pub day_ahead_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub rate: Option<f64>,
}

/// Rates on a uniform grid, strictly increasing, no gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRateSeries {
    pub timestamp_column: String,
    pub rate_column: String,
    pub records: Vec<PriceRecord>,
}

impl NormalizedRateSeries {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_uniform(&self, step: Duration) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[1].timestamp - pair[0].timestamp == step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64, // kWh
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSeries {
    pub timestamp_column: String,
    pub value_column: String,
    pub records: Vec<ConsumptionRecord>,
}

impl ConsumptionSeries {
    pub fn new(records: Vec<ConsumptionRecord>) -> Self {
        Self {
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            records,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Merged consumption and rates, plus one column per applied tariff plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedTable {
    pub(crate) timestamp_column: String,
    pub(crate) value_column: String,
    pub(crate) rate_column: String,
    pub(crate) records: Vec<MergedRecord>,
    pub(crate) plan_columns: Vec<PlanColumn>,
}

impl PricedTable {
    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn rate_column(&self) -> &str {
        &self.rate_column
    }

    pub fn records(&self) -> &[MergedRecord] {
        &self.records
    }

    pub fn plan_columns(&self) -> &[PlanColumn] {
        &self.plan_columns
    }

    pub fn plan_column(&self, name: &str) -> Option<&[f64]> {
        self.plan_columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column names in output order.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = vec![
            self.timestamp_column.as_str(),
            self.value_column.as_str(),
            self.rate_column.as_str(),
        ];
        names.extend(self.plan_columns.iter().map(|c| c.name.as_str()));
        names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names().contains(&name)
    }
}
