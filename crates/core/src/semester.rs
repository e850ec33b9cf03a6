use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::Config;

/// One configured academic term. Bounds are inclusive and fixed for the
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemesterInterval {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The full semester table, resolved to absolute time at startup.
///
/// Intervals are sorted by `(start, label)`, and [`resolve`] returns the
/// first containing interval, so when intervals overlap the earliest start
/// wins and the label breaks exact ties. Deterministic regardless of config
/// file ordering.
///
/// [`resolve`]: SemesterSchedule::resolve
#[derive(Debug, Clone, Default)]
pub struct SemesterSchedule {
    intervals: Vec<SemesterInterval>,
}

impl SemesterSchedule {
    pub fn new(mut intervals: Vec<SemesterInterval>) -> Self {
        intervals.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.label.cmp(&b.label)));
        Self { intervals }
    }

    /// Parse the configured semester table. Bounds accept a full naive
    /// datetime or a bare date; a bare date covers the whole day (start of
    /// day for `start`, 23:59:59 for `end`), interpreted in the configured
    /// timezone.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.semesters.is_empty() {
            return Ok(Self::default());
        }
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| anyhow!("Unknown timezone: {:?}", config.timezone))?;
        let mut intervals = Vec::with_capacity(config.semesters.len());
        for (label, bounds) in &config.semesters {
            let start = parse_bound(&bounds.start, tz, false)
                .with_context(|| format!("Invalid start bound for semester {label}"))?;
            let end = parse_bound(&bounds.end, tz, true)
                .with_context(|| format!("Invalid end bound for semester {label}"))?;
            if end < start {
                bail!("Semester {label} ends before it starts");
            }
            intervals.push(SemesterInterval { label: label.clone(), start, end });
        }
        Ok(Self::new(intervals))
    }

    /// Map a timestamp to the semester it falls in, both bounds inclusive.
    /// Returns `None` outside every interval; the caller omits the field
    /// rather than erroring.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<&str> {
        self.intervals
            .iter()
            .find(|interval| interval.start <= now && now <= interval.end)
            .map(|interval| interval.label.as_str())
    }

    pub fn is_empty(&self) -> bool { self.intervals.is_empty() }
}

fn parse_bound(value: &str, tz: Tz, end_of_day: bool) -> Result<DateTime<Utc>> {
    let naive = if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        dt
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        dt
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59).expect("valid literal time")
        } else {
            NaiveTime::MIN
        };
        date.and_time(time)
    } else {
        bail!("Unrecognized date {value:?} (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)");
    };
    // earliest() resolves DST-ambiguous local times; a bound inside a DST
    // gap has no local representation at all.
    tz.from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("{value:?} does not exist in timezone {tz}"))
        .map(|dt| dt.with_timezone(&Utc))
}
