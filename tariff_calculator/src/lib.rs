pub mod calculator;
pub mod data_loader;
pub mod error;
pub mod frame;
pub mod merge;
pub mod models;
pub mod rate_normalizer;
pub mod tariff;

pub use calculator::TariffCalculator;
pub use data_loader::DataLoader;
pub use error::{PricingError, Result};
pub use frame::monthly_summary;
pub use merge::{merge, merge_with};
pub use models::{
    ConsumptionRecord, ConsumptionSeries, MergeStrategy, NormalizedRateSeries, PipelineConfig,
    PriceRecord, PricedTable, RawPriceDay,
};
pub use rate_normalizer::{resample_forward_fill, RateNormalizer};
pub use tariff::{standard_plans, PlanKind, TariffPlan, TimeWindow};
