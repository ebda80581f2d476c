use anyhow::{Context, Result};
use clap::ValueEnum;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tariff_calculator::{monthly_summary, PricedTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Csv,
    Parquet,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug)]
pub struct ReportSummary {
    pub rows: usize,
    pub months: usize,
    pub priced_path: PathBuf,
    pub monthly_path: PathBuf,
    pub plan_totals: Vec<(String, f64)>,
}

pub struct ReportWriter {
    output_dir: PathBuf,
    format: ReportFormat,
}

impl ReportWriter {
    pub fn new(output_dir: PathBuf, format: ReportFormat) -> Self {
        Self { output_dir, format }
    }

    /// Write the per-interval table and its monthly roll-up for one consumption file.
    pub fn write(&self, stem: &str, table: &PricedTable) -> Result<ReportSummary> {
        let mut priced = table.to_data_frame()?;
        let mut monthly = monthly_summary(table)?;

        let ext = self.format.extension();
        let priced_path = self.output_dir.join(format!("priced_{stem}.{ext}"));
        let monthly_path = self.output_dir.join(format!("monthly_{stem}.{ext}"));

        self.write_frame(&priced_path, &mut priced)?;
        self.write_frame(&monthly_path, &mut monthly)?;

        let plan_totals = table
            .plan_columns()
            .iter()
            .map(|c| (c.name.clone(), c.values.iter().sum()))
            .collect();

        Ok(ReportSummary {
            rows: priced.height(),
            months: monthly.height(),
            priced_path,
            monthly_path,
            plan_totals,
        })
    }

    fn write_frame(&self, path: &Path, df: &mut DataFrame) -> Result<()> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        match self.format {
            ReportFormat::Csv => {
                CsvWriter::new(file).finish(df)?;
            }
            ReportFormat::Parquet => {
                ParquetWriter::new(file).finish(df)?;
            }
        }
        log::debug!("Wrote {} rows to {}", df.height(), path.display());
        Ok(())
    }
}
