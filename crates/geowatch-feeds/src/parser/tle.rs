// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Two-line element set parser.
//!
//! Accepts the three-line form (name line followed by lines 1 and 2) and bare
//! two-line sets. Line endings are normalised first, since catalogs are
//! commonly served with CRLF. A set with a bad checksum, mismatched catalog
//! numbers, or a missing line is skipped without failing the catalog.

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::debug;

use crate::error::FeedError;
use crate::orbit::OrbitalElements;

const TLE_LINE_LEN: usize = 69;

/// Parse every valid element set in a catalog.
#[must_use]
pub fn parse_tle_catalog(text: &str) -> Vec<OrbitalElements> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();

    let mut elements = Vec::new();
    let mut pending_name: Option<&str> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.starts_with("1 ") {
            match lines.get(i + 1) {
                Some(next) if next.starts_with("2 ") => {
                    match parse_tle_set(pending_name, line, next) {
                        Ok(set) => elements.push(set),
                        Err(e) => debug!("Skipping element set {:?}: {}", pending_name, e),
                    }
                    i += 2;
                }
                _ => {
                    debug!("Skipping element set {:?}: line 2 missing", pending_name);
                    i += 1;
                }
            }
            pending_name = None;
        } else if line.starts_with("2 ") {
            debug!("Skipping orphan line 2 after {:?}", pending_name);
            pending_name = None;
            i += 1;
        } else {
            pending_name = Some(line);
            i += 1;
        }
    }

    elements
}

/// Parse one element set from its two data lines and an optional name line.
pub fn parse_tle_set(name: Option<&str>, line1: &str, line2: &str) -> Result<OrbitalElements, FeedError> {
    let line1 = line1.trim_end();
    let line2 = line2.trim_end();
    check_line(line1, '1')?;
    check_line(line2, '2')?;

    let catalog_number = parse_catalog(line1)?;
    if parse_catalog(line2)? != catalog_number {
        return Err(FeedError::Validation(format!(
            "catalog number mismatch between lines for {catalog_number}"
        )));
    }

    let mean_motion = float_field(line2, 52..63, "mean motion")?;
    if !mean_motion.is_finite() || mean_motion <= 0.0 {
        return Err(FeedError::Validation(format!(
            "non-positive mean motion {mean_motion} for {catalog_number}"
        )));
    }

    let eccentricity = float_field(line2, 26..33, "eccentricity").map(|digits| digits / 1e7)?;

    let name = name
        .map(|n| n.trim().trim_start_matches("0 ").trim())
        .filter(|n| !n.is_empty())
        .map_or_else(|| format!("NORAD {catalog_number}"), str::to_string);

    Ok(OrbitalElements {
        catalog_number,
        name,
        epoch: parse_epoch(line1)?,
        inclination_deg: float_field(line2, 8..16, "inclination")?,
        raan_deg: float_field(line2, 17..25, "right ascension")?,
        eccentricity,
        arg_perigee_deg: float_field(line2, 34..42, "argument of perigee")?,
        mean_anomaly_deg: float_field(line2, 43..51, "mean anomaly")?,
        mean_motion_rev_per_day: mean_motion,
    })
}

fn check_line(line: &str, number: char) -> Result<(), FeedError> {
    if !line.is_ascii() || line.len() != TLE_LINE_LEN {
        return Err(FeedError::Decode(format!(
            "line {number} must be {TLE_LINE_LEN} ASCII characters, got {}",
            line.len()
        )));
    }
    if !line.starts_with(number) {
        return Err(FeedError::Decode(format!("expected line {number}")));
    }
    let expected = line[TLE_LINE_LEN - 1..]
        .parse::<u32>()
        .map_err(|e| FeedError::Decode(format!("line {number} checksum digit: {e}")))?;
    let actual = checksum(&line[..TLE_LINE_LEN - 1]);
    if expected != actual {
        return Err(FeedError::Validation(format!(
            "line {number} checksum {actual} does not match {expected}"
        )));
    }
    Ok(())
}

/// Modulo-10 sum of digits, with each minus sign counting as one.
fn checksum(body: &str) -> u32 {
    body.chars()
        .map(|c| match c {
            '-' => 1,
            _ => c.to_digit(10).unwrap_or(0),
        })
        .sum::<u32>()
        % 10
}

fn parse_catalog(line: &str) -> Result<u32, FeedError> {
    line[2..7]
        .trim()
        .parse()
        .map_err(|e| FeedError::Decode(format!("catalog number: {e}")))
}

fn float_field(line: &str, range: std::ops::Range<usize>, field: &str) -> Result<f64, FeedError> {
    line[range]
        .trim()
        .parse()
        .map_err(|e| FeedError::Decode(format!("{field}: {e}")))
}

/// Epoch from the two-digit year and fractional day-of-year on line 1.
fn parse_epoch(line1: &str) -> Result<DateTime<Utc>, FeedError> {
    let yy: i32 = line1[18..20]
        .trim()
        .parse()
        .map_err(|e| FeedError::Decode(format!("epoch year: {e}")))?;
    let year = if yy < 57 { 2000 + yy } else { 1900 + yy };
    let day_of_year = float_field(line1, 20..32, "epoch day")?;
    if !(1.0..367.0).contains(&day_of_year) {
        return Err(FeedError::Validation(format!("epoch day {day_of_year} out of range")));
    }

    let start = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| FeedError::Validation(format!("invalid epoch year {year}")))?;
    #[allow(clippy::cast_possible_truncation, reason = "bounded by the day-of-year range check")]
    let offset_ms = ((day_of_year - 1.0) * 86_400_000.0).round() as i64;
    Ok(start + Duration::milliseconds(offset_ms))
}
