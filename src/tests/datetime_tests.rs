// src/tests/datetime_tests.rs

//! tests for `datetime.rs` functions

#![allow(non_snake_case)]

use ::test_case::test_case;

use crate::data::datetime::{
    clamp_micros,
    datetimel_to_micros,
    micros_to_datetimel,
    month_abbr_to_num,
    parse_hms,
    ymd_hms_to_micros,
    Datelike,
    EpochMicros,
    Month,
    TimeZone,
    Timelike,
    EPOCH_MICROS_NONE,
    MICROS_PER_SEC,
};
use crate::tests::common::{FO_0, FO_M8, FO_P1};

#[test_case(0, 0)]
#[test_case(-1, 0; "negative one")]
#[test_case(i64::MIN, 0; "most negative")]
#[test_case(5, 5)]
#[test_case(1_700_000_000_000_000, 1_700_000_000_000_000)]
fn test_clamp_micros(
    input: i64,
    expect: EpochMicros,
) {
    assert_eq!(clamp_micros(input), expect);
}

#[test]
fn test_ymd_hms_epoch_plus_one_second() {
    assert_eq!(
        ymd_hms_to_micros(&FO_0, 1970, 1, 1, 0, 0, 1),
        Some(MICROS_PER_SEC as EpochMicros),
    );
}

#[test]
fn test_ymd_hms_honors_tz_offset() {
    // 01:00 at UTC+01:00 is the epoch itself
    assert_eq!(
        ymd_hms_to_micros(&FO_P1, 1970, 1, 1, 1, 0, 0),
        Some(EPOCH_MICROS_NONE),
    );
    // 00:00 at UTC-08:00 is eight hours past the epoch
    assert_eq!(
        ymd_hms_to_micros(&FO_M8, 1970, 1, 1, 0, 0, 0),
        Some(8 * 3600 * MICROS_PER_SEC as EpochMicros),
    );
}

#[test]
fn test_ymd_hms_pre_epoch_clamps_to_zero() {
    assert_eq!(ymd_hms_to_micros(&FO_0, 1969, 12, 31, 23, 59, 59), Some(0));
    assert_eq!(ymd_hms_to_micros(&FO_0, 1955, 6, 1, 0, 0, 0), Some(0));
}

#[test_case(2024, 13, 1; "month thirteen")]
#[test_case(2024, 0, 1; "month zero")]
#[test_case(2024, 2, 30; "february thirtieth")]
#[test_case(2023, 2, 29; "february twenty ninth non leap")]
fn test_ymd_hms_invalid_date(
    year: i32,
    month: Month,
    day: u32,
) {
    assert_eq!(ymd_hms_to_micros(&FO_0, year, month, day, 12, 0, 0), None);
}

#[test]
fn test_datetimel_to_micros_pre_epoch() {
    let dt = FO_0.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(datetimel_to_micros(&dt), EPOCH_MICROS_NONE);
}

#[test]
fn test_micros_roundtrip() {
    let micros: EpochMicros = ymd_hms_to_micros(&FO_0, 2024, 3, 15, 10, 30, 0).unwrap();
    let dt = micros_to_datetimel(micros, &FO_0).unwrap();
    assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 15));
    assert_eq!((dt.hour(), dt.minute(), dt.second()), (10, 30, 0));
}

#[test]
fn test_micros_to_datetimel_tz() {
    let micros: EpochMicros = ymd_hms_to_micros(&FO_0, 2024, 3, 15, 10, 30, 0).unwrap();
    let dt = micros_to_datetimel(micros, &FO_P1).unwrap();
    assert_eq!(dt.hour(), 11);
}

#[test_case("10:30:00", Some((10, 30, 0)))]
#[test_case("00:00:00", Some((0, 0, 0)))]
#[test_case("23:59:60", Some((23, 59, 60)); "leap second")]
#[test_case("24:00:00", None; "hour out of range")]
#[test_case("10:61:00", None; "minute out of range")]
#[test_case("10:30:61", None; "second out of range")]
#[test_case("103000", None; "no separators")]
#[test_case("10:30", None; "missing seconds")]
#[test_case("aa:bb:cc", None; "not digits")]
fn test_parse_hms(
    input: &str,
    expect: Option<(u32, u32, u32)>,
) {
    assert_eq!(parse_hms(input), expect);
}

#[test_case("Jan", Some(1))]
#[test_case("jan", Some(1); "lowercase")]
#[test_case("DEC", Some(12); "uppercase")]
#[test_case("Sep", Some(9))]
#[test_case("xxx", None; "unknown")]
#[test_case("Janu", None; "too long")]
#[test_case("Ja", None; "too short")]
#[test_case("", None; "empty")]
fn test_month_abbr_to_num(
    abbr: &str,
    expect: Option<Month>,
) {
    assert_eq!(month_abbr_to_num(abbr), expect);
}
