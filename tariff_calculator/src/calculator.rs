use log::{debug, info};
use std::collections::HashSet;

use crate::error::{PricingError, Result};
use crate::merge::merge_with;
use crate::models::{
    ConsumptionSeries, NormalizedRateSeries, PipelineConfig, PlanColumn, PricedTable, RawPriceDay,
};
use crate::rate_normalizer::RateNormalizer;
use crate::tariff::TariffPlan;

impl PricedTable {
    /// Add the plan's price column. Fails without touching the table if the
    /// column already exists.
    pub fn apply_plan(&mut self, plan: &TariffPlan) -> Result<()> {
        if self.has_column(&plan.column) {
            return Err(PricingError::DuplicateColumn(plan.column.clone()));
        }

        let values = self
            .records
            .iter()
            .map(|record| plan.price(&record.timestamp, record.value))
            .collect();
        self.plan_columns.push(PlanColumn {
            name: plan.column.clone(),
            values,
        });
        debug!("Applied {} as {}", plan.name, plan.column);

        Ok(())
    }

    /// Apply plans in order. All columns are checked up front, so either every
    /// plan is applied or none is.
    pub fn apply_plans(&mut self, plans: &[TariffPlan]) -> Result<()> {
        let mut seen = HashSet::new();
        for plan in plans {
            if self.has_column(&plan.column) || !seen.insert(plan.column.as_str()) {
                return Err(PricingError::DuplicateColumn(plan.column.clone()));
            }
        }

        for plan in plans {
            self.apply_plan(plan)?;
        }
        Ok(())
    }
}

pub struct TariffCalculator {
    config: PipelineConfig,
}

impl TariffCalculator {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn normalize_rates(&self, raw_days: &[RawPriceDay]) -> Result<NormalizedRateSeries> {
        RateNormalizer::new(&self.config)?.normalize(raw_days)
    }

    /// Merge consumption with already normalized rates and apply every configured plan.
    pub fn price(
        &self,
        consumption: &ConsumptionSeries,
        rates: &NormalizedRateSeries,
    ) -> Result<PricedTable> {
        let mut table = merge_with(
            consumption,
            rates,
            &self.config.timestamp_column,
            self.config.merge_strategy,
        )?;
        table.apply_plans(&self.config.plans)?;
        info!(
            "Priced {} of {} readings under {} plans",
            table.len(),
            consumption.records.len(),
            self.config.plans.len()
        );
        Ok(table)
    }

    /// Full pipeline from the raw feed to the priced table.
    pub fn calculate(
        &self,
        raw_days: &[RawPriceDay],
        consumption: &ConsumptionSeries,
    ) -> Result<PricedTable> {
        let rates = self.normalize_rates(raw_days)?;
        self.price(consumption, &rates)
    }
}
