use crate::error::AppError;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Label under which the aggregate (all-services) charge is recorded.
pub const TOTAL_LABEL: &str = "Total";

/// The full calendar day a report covers, as UTC instants derived from the
/// local calendar: [00:00:00, 23:59:59] of the day before the report date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// Window for the day immediately before `date` in the local calendar.
    pub fn preceding(date: NaiveDate) -> Result<Self, AppError> {
        let day = date
            .pred_opt()
            .ok_or_else(|| AppError::Config(format!("no day precedes {date}")))?;
        Self::for_day(day)
    }

    pub fn for_day(day: NaiveDate) -> Result<Self, AppError> {
        Ok(Self {
            start: local_instant(day, 0, 0, 0)?,
            end: local_instant(day, 23, 59, 59)?,
        })
    }
}

fn local_instant(day: NaiveDate, hour: u32, min: u32, sec: u32) -> Result<DateTime<Utc>, AppError> {
    let naive = day
        .and_hms_opt(hour, min, sec)
        .ok_or_else(|| AppError::Config(format!("invalid time of day {hour}:{min}:{sec}")))?;
    // At a DST gap the earliest valid interpretation is used.
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| AppError::Config(format!("{naive} does not exist in the local timezone")))?;
    Ok(local.with_timezone(&Utc))
}

/// One (timestamp, average) sample from the metrics API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillingEntry {
    pub label: String,
    pub amount: f64,
}

/// Ordered label → amount mapping; the aggregate label comes first, then
/// services in fetch order. Labels are unique, a repeated push overwrites.
#[derive(Debug, Clone, Default)]
pub struct BillingRecord {
    entries: Vec<BillingEntry>,
}

impl BillingRecord {
    pub fn push(&mut self, label: impl Into<String>, amount: f64) {
        let label = label.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.label == label) {
            existing.amount = amount;
        } else {
            self.entries.push(BillingEntry { label, amount });
        }
    }

    pub fn entries(&self) -> &[BillingEntry] {
        &self.entries
    }

    /// Aggregate amount, or 0 when no aggregate entry was recorded.
    pub fn total(&self) -> f64 {
        self.entries
            .iter()
            .find(|e| e.label == TOTAL_LABEL)
            .map_or(0.0, |e| e.amount)
    }
}
