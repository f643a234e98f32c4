//! Time-window check: timestamps must fall inside the allowed time of day
//! for their weekday/weekend class.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use indexmap::IndexMap;
use serde_json::{json, Value};

use guard_core::SubjectRecord;

use super::types::{CheckError, Deadline, Finding};
use super::CheckStrategy;
use crate::schema::Parameters;

const DEFAULT_SERIES_FIELD: &str = "time_series";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayClass {
    Weekday,
    Weekend,
}

impl DayClass {
    pub fn of(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sat | Weekday::Sun => DayClass::Weekend,
            _ => DayClass::Weekday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayClass::Weekday => "weekday",
            DayClass::Weekend => "weekend",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekday" | "weekdays" | "工作日" => Some(DayClass::Weekday),
            "weekend" | "weekends" | "周末" => Some(DayClass::Weekend),
            _ => None,
        }
    }
}

impl fmt::Display for DayClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive `HH:MM` window. `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }

    fn parse(class: &str, value: &Value) -> Result<Self, CheckError> {
        let (start, end) = match value {
            Value::Object(map) => (map.get("start"), map.get("end")),
            Value::Array(pair) if pair.len() == 2 => (pair.first(), pair.get(1)),
            other => {
                return Err(CheckError::params(format!(
                    "window for '{}' must be {{start, end}} or [start, end], got {}",
                    class, other
                )))
            }
        };
        let hm = |v: Option<&Value>, which: &str| -> Result<NaiveTime, CheckError> {
            let s = v.and_then(Value::as_str).ok_or_else(|| {
                CheckError::params(format!("window for '{}' is missing `{}`", class, which))
            })?;
            NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| {
                CheckError::params(format!("window for '{}' has invalid {} '{}' (expected HH:MM)", class, which, s))
            })
        };
        Ok(Self {
            start: hm(start, "start")?,
            end: hm(end, "end")?,
        })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindowCheck {
    /// Day classes without an entry are unconstrained.
    pub ranges: IndexMap<DayClass, TimeRange>,
    pub series_field: String,
}

impl TimeWindowCheck {
    pub fn compile(params: &Parameters) -> Result<Self, CheckError> {
        let declared = params
            .get("allowed_ranges")
            .or_else(|| params.get("allowed_hours"))
            .ok_or_else(|| CheckError::params("time window check requires `allowed_ranges`"))?;
        let Value::Object(declared) = declared else {
            return Err(CheckError::params("`allowed_ranges` must be a mapping of weekday/weekend windows"));
        };

        let mut ranges = IndexMap::new();
        for (key, window) in declared {
            let class = DayClass::parse(key)
                .ok_or_else(|| CheckError::params(format!("unknown day class '{}'", key)))?;
            ranges.insert(class, TimeRange::parse(key, window)?);
        }
        if ranges.is_empty() {
            return Err(CheckError::params("`allowed_ranges` is empty"));
        }

        let series_field = match params.get("series_field") {
            None => DEFAULT_SERIES_FIELD.to_string(),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(_) => return Err(CheckError::params("`series_field` must be a non-empty string")),
        };

        Ok(Self { ranges, series_field })
    }
}

/// Local wall-clock time of a timestamp. Offsets are kept as written.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Pulls the timestamp out of `[ts, value]` or `{timestamp, value}`.
fn entry_timestamp(entry: &Value) -> Option<&str> {
    match entry {
        Value::Array(pair) => pair.first().and_then(Value::as_str),
        Value::Object(map) => map.get("timestamp").and_then(Value::as_str),
        Value::String(s) => Some(s),
        _ => None,
    }
}

impl CheckStrategy for TimeWindowCheck {
    fn evaluate(&self, data: &SubjectRecord, deadline: &Deadline) -> Result<Option<Finding>, CheckError> {
        let series = match data.get(&self.series_field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(series)) => series,
            Some(other) => {
                return Err(CheckError::data(
                    &self.series_field,
                    format!("expected a list of (timestamp, value) pairs, got {}", other),
                ))
            }
        };

        for (i, entry) in series.iter().enumerate() {
            deadline.check()?;
            let raw = entry_timestamp(entry).ok_or_else(|| {
                CheckError::data(&self.series_field, format!("entry {} has no timestamp: {}", i, entry))
            })?;
            let at = parse_timestamp(raw).ok_or_else(|| {
                CheckError::data(&self.series_field, format!("entry {} has unparseable timestamp '{}'", i, raw))
            })?;

            let class = DayClass::of(at.weekday());
            let Some(range) = self.ranges.get(&class) else {
                continue;
            };
            let minute = at.time().with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(at.time());
            if range.contains(minute) {
                continue;
            }

            let value = match entry {
                Value::Array(pair) => pair.get(1).cloned().unwrap_or(Value::Null),
                Value::Object(map) => map.get("value").cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            };
            return Ok(Some(Finding::new(
                format!("{} falls outside the allowed {} window {}", raw, class, range),
                json!({
                    "field": self.series_field,
                    "timestamp": raw,
                    "value": value,
                    "day_class": class.as_str(),
                    "allowed": range.to_string(),
                }),
            )));
        }
        Ok(None)
    }
}
