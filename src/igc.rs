//! IGC flight log parsing.
//!
//! Turns the text of an IGC file into a time-ordered [`Fix`] sequence plus the
//! header metadata (date, pilot, glider).
//!
//! ## B-record layout
//!
//! ```text
//! B HHMMSS DDMMmmmN DDDMMmmmE V PPPPP GGGGG [extensions...]
//! 0 1      7        15        24 25    30   35
//! ```
//!
//! - Time: UTC seconds since midnight. When a record's time is earlier than the
//!   previous record's, the log crossed UTC midnight and 86400 s is added to
//!   every following record.
//! - Position: degrees plus thousandths of minutes, negated for S/W.
//! - Altitude: GNSS altitude when it is a positive number, otherwise pressure
//!   altitude.
//!
//! A single broken B-record is skipped, never fatal. The file as a whole is
//! rejected only when it has no flight date or fewer than two usable fixes.
//!
//! Reference: <https://xp-soaring.github.io/igc_file_format/igc_format_2008.html>

use chrono::NaiveDate;
use log::{debug, warn};

use crate::error::{ParseError, Result};
use crate::Fix;

/// Minimum length of a B-record carrying time, position and both altitudes.
pub const MIN_B_RECORD_LEN: usize = 35;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Header metadata read from the `A` and `H` records.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IgcHeader {
    /// Flight date from `HFDTE`
    pub date: Option<NaiveDate>,
    /// Pilot in charge (`HFPLT`)
    pub pilot: Option<String>,
    /// Glider model (`HFGTY`)
    pub glider_type: Option<String>,
    /// Glider registration (`HFGID`)
    pub glider_id: Option<String>,
    /// Competition id (`HFCID`)
    pub competition_id: Option<String>,
    /// Flight recorder type (`HFFTY`)
    pub recorder_type: Option<String>,
    /// Three-letter manufacturer code from the `A` record
    pub manufacturer: Option<String>,
}

/// A parsed IGC file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedFlight {
    pub header: IgcHeader,
    /// Date anchoring `t_abs_sec` (header date, or the caller's hint)
    pub date: NaiveDate,
    /// Fixes ordered by strictly increasing time
    pub fixes: Vec<Fix>,
    /// B-records dropped because they were too short or not numeric
    pub skipped_records: usize,
}

/// Parse an IGC file.
///
/// `date_hint` is used only when the file has no `HFDTE` record at all; a
/// present but malformed `HFDTE` is always an error.
///
/// # Errors
///
/// - [`ParseError::MissingDate`] with neither `HFDTE` nor a hint
/// - [`ParseError::InvalidDate`] for a malformed `HFDTE`
/// - [`ParseError::InsufficientFixes`] with fewer than two usable fixes
///
/// # Example
///
/// ```rust
/// use igc_analysis::igc;
///
/// let text = "AXXX001\nHFDTE150724\n\
///             B1200004600000N00800000EA0100001000\n\
///             B1200104600100N00800000EA0101001010\n";
/// let flight = igc::parse(text, None).unwrap();
/// assert_eq!(flight.fixes.len(), 2);
/// assert_eq!(flight.fixes[1].t_sec, 10.0);
/// assert_eq!(flight.fixes[1].altitude_m, 1010.0);
/// ```
pub fn parse(text: &str, date_hint: Option<NaiveDate>) -> Result<ParsedFlight> {
    let header = parse_header(text)?;
    let date = header.date.or(date_hint).ok_or(ParseError::MissingDate)?;

    let mut fixes: Vec<Fix> = Vec::new();
    let mut b_records = 0usize;
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    let mut prev_raw: Option<u32> = None;
    let mut day_offset = 0.0;
    let mut first_abs: Option<f64> = None;

    for line in text.lines() {
        let line = line.trim_end();
        if !line.starts_with('B') {
            continue;
        }
        b_records += 1;

        let Some(record) = parse_b_record(line) else {
            skipped += 1;
            continue;
        };

        if let Some(prev) = prev_raw {
            if record.seconds_of_day < prev {
                day_offset += SECONDS_PER_DAY;
                debug!(
                    "[igc] midnight rollover after {}s, day offset now {}s",
                    prev, day_offset
                );
            }
        }
        prev_raw = Some(record.seconds_of_day);

        let t_abs_sec = record.seconds_of_day as f64 + day_offset;
        if fixes.last().is_some_and(|last| t_abs_sec <= last.t_abs_sec) {
            duplicates += 1;
            continue;
        }
        let first = *first_abs.get_or_insert(t_abs_sec);

        fixes.push(Fix {
            t_sec: t_abs_sec - first,
            t_abs_sec,
            lat: record.lat,
            lon: record.lon,
            altitude_m: record.altitude_m(),
            pressure_altitude_m: record.pressure_alt,
            gnss_altitude_m: record.gnss_alt,
            valid: record.valid,
        });
    }

    debug!(
        "[igc] {} B-records: {} fixes, {} skipped, {} duplicate timestamps",
        b_records,
        fixes.len(),
        skipped,
        duplicates
    );
    if b_records > 0 && skipped * 10 > b_records {
        warn!(
            "[igc] {} of {} B-records were malformed and skipped",
            skipped, b_records
        );
    }

    if fixes.len() < 2 {
        return Err(ParseError::InsufficientFixes { found: fixes.len() });
    }

    Ok(ParsedFlight {
        header,
        date,
        fixes,
        skipped_records: skipped,
    })
}

/// Read the `A` and `H` records of an IGC file.
///
/// # Errors
///
/// [`ParseError::InvalidDate`] if an `HFDTE` record is present but malformed.
/// A missing date is not an error here; it is left as `None`.
pub fn parse_header(text: &str) -> Result<IgcHeader> {
    let mut header = IgcHeader::default();

    for line in text.lines() {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix('A') {
            if header.manufacturer.is_none() {
                header.manufacturer = rest.get(..3).map(str::to_string);
            }
            continue;
        }
        if !line.starts_with('H') {
            continue;
        }
        // H + data source (F/O/P) + three-letter subject
        let Some(code) = line.get(2..5) else {
            continue;
        };
        let body = line.get(5..).unwrap_or("");
        match code {
            "DTE" => {
                if header.date.is_none() {
                    header.date = Some(parse_date(body)?);
                }
            }
            "PLT" => header.pilot = header_value(body),
            "GTY" => header.glider_type = header_value(body),
            "GID" => header.glider_id = header_value(body),
            "CID" => header.competition_id = header_value(body),
            "FTY" => header.recorder_type = header_value(body),
            _ => {}
        }
    }

    Ok(header)
}

/// `DDMMYY`, optionally prefixed by `DATE:` and followed by `,NN`.
fn parse_date(body: &str) -> Result<NaiveDate> {
    let digits = body.strip_prefix("DATE:").unwrap_or(body).trim_start();
    let invalid = || ParseError::InvalidDate(body.to_string());

    let ddmmyy = digits.get(..6).ok_or_else(invalid)?;
    let field = |range: std::ops::Range<usize>| ddmmyy.get(range).and_then(parse_digits);
    let day = field(0..2).ok_or_else(invalid)?;
    let month = field(2..4).ok_or_else(invalid)?;
    let yy = field(4..6).ok_or_else(invalid)?;
    let year = if yy < 80 { 2000 + yy } else { 1900 + yy };

    NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(invalid)
}

/// Header text after the first `:` (or the whole body), trimmed.
fn header_value(body: &str) -> Option<String> {
    let value = match body.split_once(':') {
        Some((_, v)) => v,
        None => body,
    }
    .trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// =============================================================================
// B-record decoding
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct BRecord {
    seconds_of_day: u32,
    lat: f64,
    lon: f64,
    valid: bool,
    pressure_alt: Option<f64>,
    gnss_alt: Option<f64>,
}

impl BRecord {
    fn altitude_m(&self) -> f64 {
        match (self.gnss_alt, self.pressure_alt) {
            (Some(g), _) if g.is_finite() && g > 0.0 => g,
            (_, Some(p)) => p,
            (Some(g), None) => g,
            // parse_b_record rejects records with neither altitude
            (None, None) => 0.0,
        }
    }
}

fn parse_b_record(line: &str) -> Option<BRecord> {
    if line.len() < MIN_B_RECORD_LEN || !line.is_ascii() {
        return None;
    }

    let hours = parse_digits(&line[1..3])?;
    let minutes = parse_digits(&line[3..5])?;
    let seconds = parse_digits(&line[5..7])?;
    if hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }

    let lat = parse_coordinate(&line[7..9], &line[9..14], &line[14..15], 'N', 'S', 90.0)?;
    let lon = parse_coordinate(&line[15..18], &line[18..23], &line[23..24], 'E', 'W', 180.0)?;

    let valid = &line[24..25] == "A";
    let pressure_alt = parse_altitude(&line[25..30]);
    let gnss_alt = parse_altitude(&line[30..35]);
    if pressure_alt.is_none() && gnss_alt.is_none() {
        return None;
    }

    Some(BRecord {
        seconds_of_day: hours * 3600 + minutes * 60 + seconds,
        lat,
        lon,
        valid,
        pressure_alt,
        gnss_alt,
    })
}

/// Degrees + `MMmmm` thousandths of minutes + hemisphere letter.
fn parse_coordinate(
    degrees: &str,
    milli_minutes: &str,
    hemisphere: &str,
    positive: char,
    negative: char,
    max_degrees: f64,
) -> Option<f64> {
    let deg = parse_digits(degrees)? as f64;
    let minutes = parse_digits(milli_minutes)? as f64 / 1000.0;
    if minutes >= 60.0 {
        return None;
    }
    let value = deg + minutes / 60.0;
    if value > max_degrees {
        return None;
    }
    let sign = match hemisphere.chars().next()? {
        c if c == positive => 1.0,
        c if c == negative => -1.0,
        _ => return None,
    };
    Some(sign * value)
}

/// Five-character altitude field, may carry a leading `-`.
fn parse_altitude(field: &str) -> Option<f64> {
    field.trim().parse::<i32>().ok().map(f64::from)
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// =============================================================================
// Tests
// =============================================================================
