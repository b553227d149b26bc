//! UTCTime / GeneralizedTime conversion to and from UNIX timestamps.

use stapler_types::CodecError;

/// Broken-down UTC date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        _ => 31,
    }
}

fn digits(s: &[u8]) -> Result<u32, CodecError> {
    s.iter().try_fold(0u32, |acc, &b| {
        if b.is_ascii_digit() {
            Ok(acc * 10 + (b - b'0') as u32)
        } else {
            Err(CodecError::InvalidTime(String::from_utf8_lossy(s).into_owned()))
        }
    })
}

/// Parse UTCTime `YYMMDDHHMMSSZ`.
/// RFC 5280: 00-49 map to 2000-2049, 50-99 to 1950-1999.
pub(crate) fn parse_utc_time(s: &[u8]) -> Result<i64, CodecError> {
    if s.len() != 13 || s[12] != b'Z' {
        return Err(CodecError::InvalidTime(String::from_utf8_lossy(s).into_owned()));
    }
    let yy = digits(&s[0..2])?;
    let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
    datetime_to_unix(
        year as i64,
        digits(&s[2..4])?,
        digits(&s[4..6])?,
        digits(&s[6..8])?,
        digits(&s[8..10])?,
        digits(&s[10..12])?,
    )
}

/// Parse GeneralizedTime `YYYYMMDDHHMMSS[.f+]Z` to whole UNIX seconds.
pub(crate) fn parse_generalized_time(s: &[u8]) -> Result<i64, CodecError> {
    let bad = || CodecError::InvalidTime(String::from_utf8_lossy(s).into_owned());
    let body = s.strip_suffix(b"Z").ok_or_else(bad)?;
    if body.len() < 14 {
        return Err(bad());
    }
    let (main, frac) = body.split_at(14);
    if !frac.is_empty() {
        let ok = frac.len() > 1
            && frac[0] == b'.'
            && frac[1..].iter().all(u8::is_ascii_digit)
            && frac.last() != Some(&b'0');
        if !ok {
            return Err(bad());
        }
    }
    datetime_to_unix(
        digits(&main[0..4])? as i64,
        digits(&main[4..6])?,
        digits(&main[6..8])?,
        digits(&main[8..10])?,
        digits(&main[10..12])?,
        digits(&main[12..14])?,
    )
}

/// A GeneralizedTime value: the UNIX second it denotes and its exact
/// content octets.
///
/// Fractional seconds survive in the encoding but not in [`unix`](Self::unix),
/// so a decoded time always re-encodes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralizedTime {
    unix: i64,
    encoded: Vec<u8>,
}

impl GeneralizedTime {
    /// Whole-second time encoded as `YYYYMMDDHHMMSSZ`.
    /// Years outside 0000-9999 cannot be represented.
    pub fn from_unix(timestamp: i64) -> Result<Self, CodecError> {
        let dt = unix_to_datetime(timestamp);
        if !(0..=9999).contains(&dt.year) {
            return Err(CodecError::InvalidTime(format!("year {}", dt.year)));
        }
        let encoded = format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
        );
        Ok(GeneralizedTime {
            unix: timestamp,
            encoded: encoded.into_bytes(),
        })
    }

    /// Parse GeneralizedTime content octets.
    pub fn from_der_value(value: &[u8]) -> Result<Self, CodecError> {
        Ok(GeneralizedTime {
            unix: parse_generalized_time(value)?,
            encoded: value.to_vec(),
        })
    }

    /// Seconds since the epoch, fraction truncated.
    pub fn unix(&self) -> i64 {
        self.unix
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// Fractional-second digits without the leading dot; empty if none.
    pub fn fraction(&self) -> &str {
        let digits = self
            .encoded
            .get(15..self.encoded.len().saturating_sub(1))
            .unwrap_or_default();
        std::str::from_utf8(digits).unwrap_or_default()
    }
}

/// Convert a date-time to a UNIX timestamp (seconds since 1970-01-01 00:00:00 UTC).
pub fn datetime_to_unix(
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
) -> Result<i64, CodecError> {
    if !(1..=12).contains(&month)
        || day == 0
        || day > days_in_month(year, month)
        || hour > 23
        || min > 59
        || sec > 59
    {
        return Err(CodecError::InvalidTime(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{min:02}:{sec:02}"
        )));
    }
    // Days from civil date (proleptic Gregorian), epoch 1970-01-01
    let y = if month <= 2 { year - 1 } else { year };
    let m = (if month <= 2 { month + 9 } else { month - 3 }) as i64;
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let doy = (153 * m + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days = era * 146097 + doe - 719468;
    Ok(days * 86400 + hour as i64 * 3600 + min as i64 * 60 + sec as i64)
}

/// Convert a UNIX timestamp to a broken-down UTC date-time.
pub fn unix_to_datetime(ts: i64) -> DateTime {
    let days = ts.div_euclid(86400);
    let secs = ts.rem_euclid(86400);

    let z = days + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);

    DateTime {
        year,
        month,
        day,
        hour: (secs / 3600) as u32,
        minute: ((secs % 3600) / 60) as u32,
        second: (secs % 60) as u32,
    }
}
