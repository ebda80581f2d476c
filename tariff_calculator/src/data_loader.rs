use chrono::{DateTime, FixedOffset, NaiveDateTime};
use log::debug;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{PricingError, Result};
use crate::models::{ConsumptionRecord, ConsumptionSeries, PipelineConfig, RawPriceDay};
use crate::rate_normalizer::localize;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Reads the two feeds handed over by the provider client.
pub struct DataLoader {
    timestamp_column: String,
    value_column: String,
    offset: FixedOffset,
}

impl DataLoader {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            timestamp_column: config.timestamp_column.clone(),
            value_column: config.value_column.clone(),
            offset: config.offset()?,
        })
    }

    /// Load a day-ahead price feed from a JSON file
    pub fn load_price_feed(&self, path: impl AsRef<Path>) -> Result<Vec<RawPriceDay>> {
        let file = File::open(path.as_ref())?;
        let days: Vec<RawPriceDay> = serde_json::from_reader(BufReader::new(file))?;
        debug!("Loaded {} feed days from {}", days.len(), path.as_ref().display());
        Ok(days)
    }

    /// Load consumption readings, JSON for `.json` files and CSV otherwise
    pub fn load_consumption(&self, path: impl AsRef<Path>) -> Result<ConsumptionSeries> {
        let path = path.as_ref();
        let file = BufReader::new(File::open(path)?);
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let series = if is_json {
            self.read_consumption_json(file)?
        } else {
            self.read_consumption_csv(file)?
        };
        debug!("Loaded {} readings from {}", series.records.len(), path.display());
        Ok(series)
    }

    pub fn read_consumption_csv<R: Read>(&self, reader: R) -> Result<ConsumptionSeries> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let timestamp_idx = self.header_index(&headers, &self.timestamp_column)?;
        let value_idx = self.header_index(&headers, &self.value_column)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let timestamp = row
                .get(timestamp_idx)
                .ok_or_else(|| self.missing(&self.timestamp_column))?;
            let value = row
                .get(value_idx)
                .ok_or_else(|| self.missing(&self.value_column))?;
            records.push(ConsumptionRecord {
                timestamp: parse_timestamp(timestamp, self.offset)?,
                value: value.parse().map_err(|_| PricingError::InvalidValue {
                    value: value.to_string(),
                    column: self.value_column.clone(),
                })?,
            });
        }

        Ok(self.series(records))
    }

    pub fn read_consumption_json<R: Read>(&self, reader: R) -> Result<ConsumptionSeries> {
        let rows: Vec<Map<String, Value>> = serde_json::from_reader(reader)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp = match row.get(&self.timestamp_column) {
                Some(Value::String(s)) => parse_timestamp(s, self.offset)?,
                Some(other) => {
                    return Err(PricingError::InvalidTimestamp {
                        value: other.to_string(),
                        reason: "expected a string".to_string(),
                    })
                }
                None => return Err(self.missing(&self.timestamp_column)),
            };
            let value = match row.get(&self.value_column) {
                Some(value) => value.as_f64().ok_or_else(|| PricingError::InvalidValue {
                    value: value.to_string(),
                    column: self.value_column.clone(),
                })?,
                None => return Err(self.missing(&self.value_column)),
            };
            records.push(ConsumptionRecord { timestamp, value });
        }

        Ok(self.series(records))
    }

    fn header_index(&self, headers: &csv::StringRecord, column: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| self.missing(column))
    }

    fn missing(&self, column: &str) -> PricingError {
        PricingError::Schema {
            column: column.to_string(),
            table: "consumption".to_string(),
        }
    }

    fn series(&self, records: Vec<ConsumptionRecord>) -> ConsumptionSeries {
        ConsumptionSeries {
            timestamp_column: self.timestamp_column.clone(),
            value_column: self.value_column.clone(),
            records,
        }
    }
}

/// Parse a reading timestamp. Timestamps without an offset are taken to be at `offset`.
pub fn parse_timestamp(value: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp);
    }
    if let Some(timestamp) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(value, format).ok())
    {
        return Ok(timestamp);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| PricingError::InvalidTimestamp {
            value: value.to_string(),
            reason: "expected YYYY-MM-DD HH:MM[:SS] with an optional offset".to_string(),
        })?;
    localize(naive, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn loader() -> DataLoader {
        DataLoader::new(&PipelineConfig::default()).unwrap()
    }

    fn israel() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn test_parse_timestamp() {
        let expected = DateTime::parse_from_rfc3339("2024-10-01T00:15:00+03:00").unwrap();
        for value in [
            "2024-10-01T00:15:00+03:00",
            "2024-10-01 00:15:00+03:00",
            "2024-10-01 00:15:00+0300",
            "2024-10-01 00:15:00",
            "2024-10-01T00:15",
            "2024-09-30T21:15:00Z",
        ] {
            assert_eq!(parse_timestamp(value, israel()).unwrap(), expected, "{value}");
        }
        assert!(parse_timestamp("yesterday", israel()).is_err());
    }

    #[test]
    fn test_read_consumption_csv() {
        let csv = "date,value\n2024-10-01 00:00:00,0.25\n2024-10-01 00:15:00, 0.5\n";
        let series = loader().read_consumption_csv(csv.as_bytes()).unwrap();
        assert_eq!(series.records.len(), 2);
        assert_eq!(series.records[1].value, 0.5);
        assert_eq!(series.timestamp_column, "date");
    }

    #[test]
    fn test_csv_without_timestamp_column() {
        let csv = "time,value\n2024-10-01 00:00:00,0.25\n";
        match loader().read_consumption_csv(csv.as_bytes()) {
            Err(PricingError::Schema { column, table }) => {
                assert_eq!(column, "date");
                assert_eq!(table, "consumption");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_csv_with_bad_value() {
        let csv = "date,value\n2024-10-01 00:00:00,lots\n";
        assert!(matches!(
            loader().read_consumption_csv(csv.as_bytes()),
            Err(PricingError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_csv_short_row_is_rejected() {
        let csv = "date,value\n2024-10-01 00:00:00,0.25\n2024-10-01 00:15:00\n";
        assert!(matches!(
            loader().read_consumption_csv(csv.as_bytes()),
            Err(PricingError::Csv(_))
        ));
    }

    #[test]
    fn test_read_consumption_json() {
        let json = r#"[{"date": "2024-10-01T00:00:00+03:00", "value": 1.5},
                       {"date": "2024-10-01 00:15:00", "value": 2}]"#;
        let series = loader().read_consumption_json(json.as_bytes()).unwrap();
        assert_eq!(series.records.len(), 2);
        assert_eq!(series.records[1].value, 2.0);

        let missing = r#"[{"date": "2024-10-01T00:00:00+03:00"}]"#;
        assert!(matches!(
            loader().read_consumption_json(missing.as_bytes()),
            Err(PricingError::Schema { column, .. }) if column == "value"
        ));
    }

    #[test]
    fn test_load_files() {
        let dir = tempfile::tempdir().unwrap();

        let feed_path = dir.path().join("noga_rate.json");
        std::fs::write(
            &feed_path,
            r#"[{"date": "01/10/2024", "smpData": [{"time": "00:00", "day_Ahead_Constrained_Smp": 300}]}]"#,
        )
        .unwrap();
        let days = loader().load_price_feed(&feed_path).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].entries[0].day_ahead_price, Some(300.0));

        let usage_path = dir.path().join("usage.csv");
        let mut file = File::create(&usage_path).unwrap();
        writeln!(file, "date,value").unwrap();
        writeln!(file, "2024-10-01 00:00:00,0.4").unwrap();
        drop(file);
        let series = loader().load_consumption(&usage_path).unwrap();
        assert_eq!(series.records.len(), 1);

        assert!(matches!(
            loader().load_consumption(dir.path().join("missing.csv")),
            Err(PricingError::Io(_))
        ));
    }
}
