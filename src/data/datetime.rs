// src/data/datetime.rs

//! Epoch-microsecond timestamp helpers.
//!
//! An extracted timestamp is an [`EpochMicros`]: unsigned microseconds
//! since the Unix epoch, UTC. The value `0` is the sentinel for
//! "not a time" and is a valid, non-error value. Readers never produce a
//! negative timestamp; conversions that would go negative clamp to `0`
//! (see [`clamp_micros`]).

#[doc(hidden)]
pub use ::chrono::{
    DateTime,
    Datelike,
    Duration,
    FixedOffset,
    LocalResult,
    TimeZone,
    Timelike,
    Utc,
};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

/// The `DateTime` type used internally; the per-run timezone is a
/// [`FixedOffset`] applied to datetime formats without a timezone.
pub type DateTimeL = DateTime<FixedOffset>;
pub type DateTimeLOpt = Option<DateTimeL>;

pub type Year = i32;
pub type Month = u32;
pub type Day = u32;

/// Microseconds since the Unix epoch, UTC. `0` means "not a time".
pub type EpochMicros = u64;

/// The "not a time" sentinel.
pub const EPOCH_MICROS_NONE: EpochMicros = 0;

pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Clamp a signed microsecond count to a valid [`EpochMicros`].
/// Negative values become `0`.
pub const fn clamp_micros(micros: i64) -> EpochMicros {
    if micros < 0 {
        0
    } else {
        micros as EpochMicros
    }
}

/// Convert a [`DateTimeL`] to [`EpochMicros`], clamping pre-epoch
/// datetimes to `0`.
pub fn datetimel_to_micros(dt: &DateTimeL) -> EpochMicros {
    clamp_micros(dt.timestamp_micros())
}

/// Convert an [`EpochMicros`] back to a [`DateTimeL`] in the passed
/// timezone offset. Returns `None` for values beyond the range
/// representable by `chrono`.
pub fn micros_to_datetimel(
    micros: EpochMicros,
    tz_offset: &FixedOffset,
) -> DateTimeLOpt {
    let micros_i64: i64 = i64::try_from(micros).ok()?;
    match Utc.timestamp_micros(micros_i64) {
        LocalResult::Single(dt) => Some(dt.with_timezone(tz_offset)),
        _ => None,
    }
}

/// Resolve calendar fields in the passed timezone offset to
/// [`EpochMicros`]. Returns `None` for an invalid calendar date or
/// clock reading (e.g. month `13`, hour `25`). Pre-epoch dates clamp
/// to `Some(0)`.
pub fn ymd_hms_to_micros(
    tz_offset: &FixedOffset,
    year: Year,
    month: Month,
    day: Day,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<EpochMicros> {
    match tz_offset.with_ymd_and_hms(year, month, day, hour, minute, second) {
        // an ambiguous local datetime resolves to the earlier reading
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
            Some(datetimel_to_micros(&dt))
        }
        LocalResult::None => None,
    }
}

/// Parse a `HH:MM:SS` clock reading. Range-checked; second `60` is
/// allowed for leap seconds.
pub fn parse_hms(time: &str) -> Option<(u32, u32, u32)> {
    let mut parts = time.splitn(3, ':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    let second: u32 = parts.next()?.parse().ok()?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    Some((hour, minute, second))
}

/// Month number for a three-letter English month abbreviation,
/// case-insensitive. `"Jan"` is `1`.
pub fn month_abbr_to_num(abbr: &str) -> Option<Month> {
    if abbr.len() != 3 {
        return None;
    }
    let lower: String = abbr.to_ascii_lowercase();
    match lower.as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}
