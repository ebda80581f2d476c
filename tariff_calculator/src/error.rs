use chrono::{DateTime, FixedOffset};
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("{column} not in {table}, can't perform the merge")]
    Schema { column: String, table: String },
    #[error("{0} column already exists in table")]
    DuplicateColumn(String),
    #[error("price feed has no entries to normalize")]
    EmptyInput,
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },
    #[error("invalid number {value:?} in column {column}")]
    InvalidValue { value: String, column: String },
    #[error("price feed has more than one entry at {0}")]
    DuplicateTimestamp(DateTime<FixedOffset>),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T, E = PricingError> = std::result::Result<T, E>;
