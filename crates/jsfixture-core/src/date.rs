//! Date time values and their string forms
//!
//! Time values are milliseconds since the epoch as `f64`, NaN for an
//! invalid date. Local time is a fixed offset from UTC carried by the
//! [`TimeZone`] the sandbox was configured with, so output never depends on
//! the machine running the harness.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

use crate::error::{JsResult, Thrown};

const MS_PER_DAY: f64 = 86_400_000.0;
const MAX_TIME: f64 = 8.64e15;

/// Fixed-offset local time zone with the display name shown by `Date.prototype.toString`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeZone {
    /// Minutes east of UTC
    pub offset_minutes: i32,
    pub name: String,
}

impl TimeZone {
    pub fn new(offset_minutes: i32, name: impl Into<String>) -> Self {
        Self {
            offset_minutes,
            name: name.into(),
        }
    }

    pub fn utc() -> Self {
        Self::new(0, "Coordinated Universal Time")
    }

    fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.offset_minutes * 60)
    }

    /// Convert a local time value to UTC
    pub fn local_to_utc(&self, local: f64) -> f64 {
        local - self.offset_minutes as f64 * 60_000.0
    }
}

impl Default for TimeZone {
    fn default() -> Self {
        Self::utc()
    }
}

/// TimeClip
pub fn time_clip(time: f64) -> f64 {
    if !time.is_finite() || time.abs() > MAX_TIME {
        return f64::NAN;
    }
    time.trunc() + 0.0
}

/// MakeDay: day number of `year`/`month` (0-based, may overflow)/`date`
pub fn make_day(year: f64, month: f64, date: f64) -> f64 {
    if !(year.is_finite() && month.is_finite() && date.is_finite()) {
        return f64::NAN;
    }
    let (year, month, date) = (year.trunc(), month.trunc(), date.trunc());
    let ym = year + (month / 12.0).floor();
    let mn = month.rem_euclid(12.0);
    if ym.abs() > 400_000.0 {
        return f64::NAN;
    }
    let first_of_month = NaiveDate::from_ymd_opt(ym as i32, mn as u32 + 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis() as f64 / MS_PER_DAY);
    match first_of_month {
        Some(day) => day + date - 1.0,
        None => f64::NAN,
    }
}

/// MakeTime
pub fn make_time(hours: f64, minutes: f64, seconds: f64, ms: f64) -> f64 {
    if !(hours.is_finite() && minutes.is_finite() && seconds.is_finite() && ms.is_finite()) {
        return f64::NAN;
    }
    hours.trunc() * 3_600_000.0 + minutes.trunc() * 60_000.0 + seconds.trunc() * 1000.0 + ms.trunc()
}

/// MakeDate
pub fn make_date(day: f64, time: f64) -> f64 {
    if !(day.is_finite() && time.is_finite()) {
        return f64::NAN;
    }
    day * MS_PER_DAY + time
}

fn in_zone(time: f64, zone: &TimeZone) -> Option<DateTime<FixedOffset>> {
    if time.is_nan() {
        return None;
    }
    let utc = DateTime::<Utc>::from_timestamp_millis(time as i64)?;
    Some(utc.with_timezone(&zone.offset()?))
}

/// `Date.prototype.toString`, e.g. `Sat Feb 03 2001 04:05:06 GMT+0800 (China Standard Time)`
pub fn to_date_string(time: f64, zone: &TimeZone) -> String {
    match in_zone(time, zone) {
        Some(local) => format!(
            "{} ({})",
            local.format("%a %b %d %Y %H:%M:%S GMT%z"),
            zone.name
        ),
        None => "Invalid Date".to_string(),
    }
}

/// `Date.prototype.toDateString`
pub fn to_date_only_string(time: f64, zone: &TimeZone) -> String {
    match in_zone(time, zone) {
        Some(local) => local.format("%a %b %d %Y").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// `Date.prototype.toTimeString`
pub fn to_time_string(time: f64, zone: &TimeZone) -> String {
    match in_zone(time, zone) {
        Some(local) => format!("{} ({})", local.format("%H:%M:%S GMT%z"), zone.name),
        None => "Invalid Date".to_string(),
    }
}

/// `Date.prototype.toUTCString`
pub fn to_utc_string(time: f64) -> String {
    match in_zone(time, &TimeZone::utc()) {
        Some(utc) => utc.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// `Date.prototype.toISOString`
pub fn to_iso_string(time: f64) -> JsResult<String> {
    let Some(utc) = in_zone(time, &TimeZone::utc()) else {
        return Err(Thrown::range_error("Invalid time value"));
    };
    let year = utc.year();
    let year = if (0..=9999).contains(&year) {
        format!("{year:04}")
    } else {
        format!("{year:+07}")
    };
    Ok(format!("{year}-{}", utc.format("%m-%dT%H:%M:%S%.3fZ")))
}
