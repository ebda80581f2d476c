//! Time-windowed tariff plans.
//!
//! Every plan prices a consumption value with a base multiplier, optionally
//! replaced by a window multiplier when the timestamp falls inside the plan's
//! time window.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PricingError, Result};

/// IEC household rate factor shared by every plan.
pub const IEC_RATE: f64 = 0.62;

/// Ordered factors applied left to right, so `[0.93, 0.62]` evaluates as
/// `value * 0.93 * 0.62` and not `value * (0.93 * 0.62)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Multiplier(Vec<f64>);

impl Multiplier {
    pub fn new(factors: impl Into<Vec<f64>>) -> Self {
        Self(factors.into())
    }

    pub fn factors(&self) -> &[f64] {
        &self.0
    }

    pub fn apply(&self, value: f64) -> f64 {
        self.0.iter().fold(value, |acc, factor| acc * factor)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaySet {
    #[default]
    Everyday,
    /// Monday to Friday.
    Weekdays,
}

impl DaySet {
    pub fn contains(self, weekday: Weekday) -> bool {
        match self {
            DaySet::Everyday => true,
            DaySet::Weekdays => !matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

/// Hours `[start_hour, end_hour)`. When `start_hour > end_hour` the window wraps
/// past midnight, e.g. 23..7 covers 23:00 to 06:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    #[serde(default)]
    pub days: DaySet,
}

impl TimeWindow {
    pub const fn hours(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
            days: DaySet::Everyday,
        }
    }

    pub const fn weekdays(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
            days: DaySet::Weekdays,
        }
    }

    /// Both hours must be within 0..=23.
    pub fn validate(&self) -> Result<()> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(PricingError::InvalidConfig(format!(
                "time window {}..{} has an hour outside 0..=23",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }

    /// Hour and weekday are taken in the timestamp's own offset.
    pub fn contains<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> bool {
        let hour = timestamp.hour();
        let in_hours = if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        };
        in_hours && self.days.contains(timestamp.weekday())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRate {
    pub window: TimeWindow,
    pub multiplier: Multiplier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffPlan {
    pub name: String,
    /// Output column added by the plan.
    pub column: String,
    pub base: Multiplier,
    #[serde(default)]
    pub window: Option<WindowRate>,
}

impl TariffPlan {
    pub fn flat(name: &str, column: &str, base: Multiplier) -> Self {
        Self {
            name: name.to_string(),
            column: column.to_string(),
            base,
            window: None,
        }
    }

    pub fn windowed(
        name: &str,
        column: &str,
        base: Multiplier,
        window: TimeWindow,
        multiplier: Multiplier,
    ) -> Self {
        Self {
            name: name.to_string(),
            column: column.to_string(),
            base,
            window: Some(WindowRate { window, multiplier }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match &self.window {
            Some(rate) if rate.window.validate().is_err() => Err(PricingError::InvalidConfig(
                format!(
                    "plan {}: time window {}..{} has an hour outside 0..=23",
                    self.name, rate.window.start_hour, rate.window.end_hour
                ),
            )),
            _ => Ok(()),
        }
    }

    pub fn price<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>, value: f64) -> f64 {
        match &self.window {
            Some(rate) if rate.window.contains(timestamp) => rate.multiplier.apply(value),
            _ => self.base.apply(value),
        }
    }
}

/// The discount plans offered on top of the IEC rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanKind {
    SevenPercent,
    Iec,
    TwentyPercent,
    TenPercent,
    FifteenPercent,
    EighteenPercent,
    EightPercent,
}

impl PlanKind {
    pub const ALL: [PlanKind; 7] = [
        PlanKind::SevenPercent,
        PlanKind::Iec,
        PlanKind::TwentyPercent,
        PlanKind::TenPercent,
        PlanKind::FifteenPercent,
        PlanKind::EighteenPercent,
        PlanKind::EightPercent,
    ];

    pub const fn short_name(self) -> &'static str {
        match self {
            PlanKind::SevenPercent => "7",
            PlanKind::Iec => "iec",
            PlanKind::TwentyPercent => "20",
            PlanKind::TenPercent => "10",
            PlanKind::FifteenPercent => "15",
            PlanKind::EighteenPercent => "18",
            PlanKind::EightPercent => "8",
        }
    }

    pub fn plan(self) -> TariffPlan {
        let base = Multiplier::new([IEC_RATE]);
        match self {
            PlanKind::SevenPercent => TariffPlan::flat(
                "7% discount",
                "7_percent_discount",
                Multiplier::new([0.93, IEC_RATE]),
            ),
            PlanKind::Iec => TariffPlan::flat("IEC standard", "iec_plan_price", base),
            PlanKind::TwentyPercent => TariffPlan::windowed(
                "20% discount",
                "20_percent_discount",
                base,
                TimeWindow::hours(23, 7),
                Multiplier::new([0.8, IEC_RATE]),
            ),
            PlanKind::TenPercent => TariffPlan::windowed(
                "10% discount",
                "10_percent_discount",
                base,
                TimeWindow::hours(17, 23),
                Multiplier::new([0.9, IEC_RATE]),
            ),
            PlanKind::FifteenPercent => TariffPlan::windowed(
                "15% discount",
                "15_percent_discount",
                base,
                TimeWindow::weekdays(7, 17),
                Multiplier::new([0.85, IEC_RATE]),
            ),
            PlanKind::EighteenPercent => TariffPlan::windowed(
                "18% discount",
                "18_off_noga_rate",
                base,
                TimeWindow::hours(14, 22),
                Multiplier::new([0.82, IEC_RATE]),
            ),
            PlanKind::EightPercent => TariffPlan::windowed(
                "8% discount",
                "8_percent_discount",
                base,
                TimeWindow::hours(23, 17),
                Multiplier::new([0.92, IEC_RATE]),
            ),
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for PlanKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('%').to_ascii_lowercase();
        PlanKind::ALL
            .into_iter()
            .find(|kind| kind.short_name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = PlanKind::ALL.iter().map(|k| k.short_name()).collect();
                format!("unknown plan {s:?}, expected one of {}", known.join(", "))
            })
    }
}

/// The full catalog, in the order the columns are added.
pub fn standard_plans() -> Vec<TariffPlan> {
    PlanKind::ALL.into_iter().map(PlanKind::plan).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        // 2024-01-01 is a Monday
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_local_timezone(FixedOffset::east_opt(3 * 3600).unwrap())
            .unwrap()
    }

    #[test]
    fn test_multiplier_order() {
        let value = 3.7;
        assert_eq!(Multiplier::new([0.93, 0.62]).apply(value), value * 0.93 * 0.62);
        assert_eq!(Multiplier::new(Vec::<f64>::new()).apply(value), value);
    }

    #[test]
    fn test_twenty_percent_example() {
        let plan = PlanKind::TwentyPercent.plan();
        assert_eq!(plan.price(&at(1, 23), 10.0), 10.0 * 0.8 * 0.62);
        assert!((plan.price(&at(1, 23), 10.0) - 4.96).abs() < 1e-12);
        assert_eq!(plan.price(&at(1, 12), 10.0), 10.0 * 0.62);
        assert!((plan.price(&at(1, 12), 10.0) - 6.2).abs() < 1e-12);
        assert_eq!(plan.price(&at(1, 6), 10.0), 10.0 * 0.8 * 0.62);
        assert_eq!(plan.price(&at(1, 7), 10.0), 10.0 * 0.62);
    }

    #[test]
    fn test_flat_plans() {
        for hour in [0, 7, 12, 17, 23] {
            assert_eq!(PlanKind::SevenPercent.plan().price(&at(6, hour), 2.5), 2.5 * 0.93 * 0.62);
            assert_eq!(PlanKind::Iec.plan().price(&at(6, hour), 2.5), 2.5 * 0.62);
        }
    }

    #[test]
    fn test_window_boundaries() {
        let ten = PlanKind::TenPercent.plan();
        assert_eq!(ten.price(&at(2, 16), 1.0), 0.62);
        assert_eq!(ten.price(&at(2, 17), 1.0), 1.0 * 0.9 * 0.62);
        assert_eq!(ten.price(&at(2, 22), 1.0), 1.0 * 0.9 * 0.62);
        assert_eq!(ten.price(&at(2, 23), 1.0), 0.62);

        let eighteen = PlanKind::EighteenPercent.plan();
        assert_eq!(eighteen.price(&at(2, 13), 1.0), 0.62);
        assert_eq!(eighteen.price(&at(2, 14), 1.0), 1.0 * 0.82 * 0.62);
        assert_eq!(eighteen.price(&at(2, 22), 1.0), 0.62);

        let eight = PlanKind::EightPercent.plan();
        assert_eq!(eight.price(&at(2, 0), 1.0), 1.0 * 0.92 * 0.62);
        assert_eq!(eight.price(&at(2, 16), 1.0), 1.0 * 0.92 * 0.62);
        assert_eq!(eight.price(&at(2, 17), 1.0), 0.62);
        assert_eq!(eight.price(&at(2, 22), 1.0), 0.62);
        assert_eq!(eight.price(&at(2, 23), 1.0), 1.0 * 0.92 * 0.62);
    }

    #[test]
    fn test_fifteen_percent_skips_weekend() {
        let plan = PlanKind::FifteenPercent.plan();
        // Friday 2024-01-05, Saturday 2024-01-06, Sunday 2024-01-07
        assert_eq!(plan.price(&at(5, 10), 1.0), 1.0 * 0.85 * 0.62);
        assert_eq!(plan.price(&at(6, 10), 1.0), 0.62);
        assert_eq!(plan.price(&at(7, 10), 1.0), 0.62);
        assert_eq!(plan.price(&at(5, 17), 1.0), 0.62);
        assert_eq!(plan.price(&at(5, 6), 1.0), 0.62);
    }

    #[test]
    fn test_hour_read_in_own_offset() {
        let plan = PlanKind::TwentyPercent.plan();
        // 20:00Z is 23:00 in Israel, but the reading carries UTC
        let utc = DateTime::parse_from_rfc3339("2024-01-01T20:00:00Z").unwrap();
        assert_eq!(plan.price(&utc, 10.0), 10.0 * 0.62);

        let local = utc.with_timezone(&FixedOffset::east_opt(3 * 3600).unwrap());
        assert_eq!(plan.price(&local, 10.0), 10.0 * 0.8 * 0.62);

        // Sunday 22:00Z is Monday 01:00 in Israel
        let weekdays = TariffPlan::windowed(
            "weekdays",
            "weekday_price",
            Multiplier::new([IEC_RATE]),
            TimeWindow::weekdays(0, 23),
            Multiplier::new([0.85, IEC_RATE]),
        );
        let sunday = DateTime::parse_from_rfc3339("2024-01-07T22:00:00Z").unwrap();
        assert_eq!(weekdays.price(&sunday, 1.0), 0.62);
        let monday = sunday.with_timezone(&FixedOffset::east_opt(3 * 3600).unwrap());
        assert_eq!(weekdays.price(&monday, 1.0), 1.0 * 0.85 * 0.62);
    }

    #[test]
    fn test_window_hours_are_validated() {
        assert!(TimeWindow::hours(23, 7).validate().is_ok());
        assert!(TimeWindow::hours(0, 23).validate().is_ok());
        assert!(matches!(
            TimeWindow::hours(23, 24).validate(),
            Err(PricingError::InvalidConfig(_))
        ));
        assert!(TimeWindow::weekdays(25, 7).validate().is_err());

        let plan = TariffPlan::windowed(
            "late",
            "late_price",
            Multiplier::new([IEC_RATE]),
            TimeWindow::hours(30, 2),
            Multiplier::new([0.5]),
        );
        match plan.validate() {
            Err(PricingError::InvalidConfig(msg)) => assert!(msg.contains("late")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(standard_plans().iter().all(|p| p.validate().is_ok()));
    }

    #[test]
    fn test_plan_kind_from_str() {
        assert_eq!("iec".parse::<PlanKind>().unwrap(), PlanKind::Iec);
        assert_eq!("20%".parse::<PlanKind>().unwrap(), PlanKind::TwentyPercent);
        assert_eq!(" IEC ".parse::<PlanKind>().unwrap(), PlanKind::Iec);
        assert!("25".parse::<PlanKind>().is_err());
    }

    #[test]
    fn test_standard_plan_columns() {
        let columns: Vec<_> = standard_plans().into_iter().map(|p| p.column).collect();
        assert_eq!(
            columns,
            [
                "7_percent_discount",
                "iec_plan_price",
                "20_percent_discount",
                "10_percent_discount",
                "15_percent_discount",
                "18_off_noga_rate",
                "8_percent_discount",
            ]
        );
    }

    #[test]
    fn test_plan_json_roundtrip_keeps_factors() {
        let plan = PlanKind::FifteenPercent.plan();
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"weekdays\""));
        let back: TariffPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
