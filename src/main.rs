use anyhow::{bail, Context, Result};
use clap::Parser;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tariff_calculator::{
    DataLoader, MergeStrategy, NormalizedRateSeries, PipelineConfig, PlanKind, TariffCalculator,
};

mod report;

use report::{ReportFormat, ReportSummary, ReportWriter};

#[derive(Parser)]
#[command(name = "iec_pricing")]
#[command(about = "Price metered consumption against NOGA day-ahead rates and IEC discount plans")]
struct Args {
    /// Day-ahead price feed (JSON)
    #[arg(short, long)]
    prices: PathBuf,

    /// Consumption file or glob pattern (CSV or JSON)
    #[arg(short, long)]
    consumption: String,

    /// Directory for the generated reports
    #[arg(short, long, default_value = "pricing_output")]
    output_dir: PathBuf,

    /// Plans to apply (7, iec, 20, 10, 15, 18, 8). Defaults to every plan
    #[arg(long = "plan")]
    plans: Vec<PlanKind>,

    /// Pipeline configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: ReportFormat,

    /// Keep readings without a matching rate instead of dropping them
    #[arg(long)]
    keep_unmatched: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if !self.plans.is_empty() {
            config.plans = self.plans.iter().map(|kind| kind.plan()).collect();
        }
        if self.keep_unmatched {
            config.merge_strategy = MergeStrategy::KeepUnmatched;
        }
        Ok(config)
    }
}

fn process_consumption_file(
    path: &Path,
    loader: &DataLoader,
    calculator: &TariffCalculator,
    rates: &NormalizedRateSeries,
    writer: &ReportWriter,
) -> Result<ReportSummary> {
    let consumption = loader
        .load_consumption(path)
        .with_context(|| format!("loading consumption {}", path.display()))?;
    let table = calculator.price(&consumption, rates)?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("consumption");
    writer.write(stem, &table)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("\n⚡ IEC Plan Pricing");
    println!("{}", "=".repeat(60));

    let config = args.pipeline_config()?;
    let loader = DataLoader::new(&config)?;
    let calculator = TariffCalculator::new(config);

    let raw_days = loader
        .load_price_feed(&args.prices)
        .with_context(|| format!("loading price feed {}", args.prices.display()))?;
    let rates = calculator.normalize_rates(&raw_days)?;
    info!("Normalized {} feed days into {} rate points", raw_days.len(), rates.len());
    if let (Some(first), Some(last)) = (rates.records.first(), rates.records.last()) {
        println!("📈 Rates: {} points from {} to {}", rates.len(), first.timestamp, last.timestamp);
    }

    let files: Vec<PathBuf> = glob(&args.consumption)?
        .filter_map(|entry| entry.ok())
        .collect();
    if files.is_empty() {
        bail!("No consumption files match '{}'", args.consumption);
    }
    println!("📁 Found {} consumption files", files.len());

    std::fs::create_dir_all(&args.output_dir)?;
    let writer = ReportWriter::new(args.output_dir.clone(), args.format);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?);

    let results: Vec<(PathBuf, Result<ReportSummary>)> = files
        .par_iter()
        .map(|path| {
            let result = process_consumption_file(path, &loader, &calculator, &rates, &writer);
            pb.inc(1);
            (path.clone(), result)
        })
        .collect();
    pb.finish_with_message("done");

    let mut failures = 0;
    for (path, result) in &results {
        match result {
            Ok(summary) => {
                println!("\n✅ {}", path.display());
                println!("   {} rows over {} months", summary.rows, summary.months);
                for (plan, total) in &summary.plan_totals {
                    println!("   {:<22} {:>12.2}", plan, total);
                }
                println!("   → {}", summary.priced_path.display());
                println!("   → {}", summary.monthly_path.display());
            }
            Err(e) => {
                failures += 1;
                error!("Failed to price {}: {:#}", path.display(), e);
                println!("\n❌ {}: {:#}", path.display(), e);
            }
        }
    }

    if failures == results.len() {
        bail!("Every consumption file failed");
    }
    Ok(())
}
