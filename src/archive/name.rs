//! Archive filename codec
//!
//! A sealed blob's file name is its primary key: it encodes the instant the
//! snapshot was taken. Two encodings coexist and both must keep decoding:
//!
//! - Unix seconds: `1733100000.tar.gpg`
//! - Structured UTC: `2024-12-01_23-37-27.tar.gpg` or, with milliseconds,
//!   `2024-12-01_23-37-27-060.tar.gpg`
//!
//! New archives always use the structured form with milliseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{WardError, WardResult};

/// Suffix every sealed blob carries
pub const SEALED_SUFFIX: &str = ".tar.gpg";

/// Encode an instant as a structured archive file name
pub fn encode(instant: DateTime<Utc>) -> String {
    format!(
        "{}-{:03}{}",
        instant.format("%Y-%m-%d_%H-%M-%S"),
        instant.timestamp_subsec_millis(),
        SEALED_SUFFIX
    )
}

/// Encode an instant in the legacy Unix-seconds form
pub fn encode_unix(instant: DateTime<Utc>) -> String {
    format!("{}{}", instant.timestamp(), SEALED_SUFFIX)
}

/// Decode the instant from an archive name, with or without the suffix
pub fn decode(name: &str) -> WardResult<DateTime<Utc>> {
    let stem = name.strip_suffix(SEALED_SUFFIX).unwrap_or(name);
    let invalid = || WardError::InvalidArchiveName(name.to_string());

    if stem.contains('_') {
        parse_structured(stem).ok_or_else(invalid)
    } else {
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let seconds: i64 = stem.parse().map_err(|_| invalid())?;
        Utc.timestamp_opt(seconds, 0).single().ok_or_else(invalid)
    }
}

/// Whether `name` looks like a sealed blob at all
pub fn has_sealed_suffix(name: &str) -> bool {
    name.len() > SEALED_SUFFIX.len() && name.ends_with(SEALED_SUFFIX)
}

/// Parse `YYYY-MM-DD_HH-mm-ss[-SSS]`
fn parse_structured(stem: &str) -> Option<DateTime<Utc>> {
    let (date_part, time_part) = stem.split_once('_')?;

    let date_fields: Vec<&str> = date_part.split('-').collect();
    let time_fields: Vec<&str> = time_part.split('-').collect();
    if date_fields.len() != 3 || !(3..=4).contains(&time_fields.len()) {
        return None;
    }

    let widths = [4, 2, 2];
    if date_fields.iter().zip(widths).any(|(f, w)| !is_padded(f, w)) {
        return None;
    }
    if time_fields[..3].iter().any(|f| !is_padded(f, 2)) {
        return None;
    }

    let year: i32 = date_fields[0].parse().ok()?;
    let month: u32 = date_fields[1].parse().ok()?;
    let day: u32 = date_fields[2].parse().ok()?;
    let hour: u32 = time_fields[0].parse().ok()?;
    let minute: u32 = time_fields[1].parse().ok()?;
    let second: u32 = time_fields[2].parse().ok()?;
    let millis: u32 = match time_fields.get(3) {
        Some(field) if is_padded(field, 3) => field.parse().ok()?,
        Some(_) => return None,
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;
    Some(DateTime::from_naive_utc_and_offset(
        NaiveDateTime::new(date, time),
        Utc,
    ))
}

fn is_padded(field: &str, width: usize) -> bool {
    field.len() == width && field.bytes().all(|b| b.is_ascii_digit())
}
