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

//! Greenwich Mean Sidereal Time.

use std::f64::consts::TAU;

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;
/// 2000-01-01T12:00:00Z as Unix seconds.
const J2000_UNIX_SECONDS: f64 = 946_728_000.0;

const GMST_BASE_DEG: f64 = 280.460_618_37;
const GMST_ROTATION_PER_DAY_DEG: f64 = 360.985_647_366_29;
const GMST_CORRECTION: f64 = 0.000_387_933;

/// Earth rotation rate relative to the stars, degrees per second.
pub const SIDEREAL_RATE_DEG_PER_SEC: f64 = GMST_ROTATION_PER_DAY_DEG / SECONDS_PER_DAY;

/// Greenwich Mean Sidereal Time at `at`, in radians within `[0, 2π)`.
///
/// Computed from absolute time since J2000, so it does not depend on any
/// element set's epoch.
#[must_use]
pub fn gmst(at: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss, reason = "millisecond timestamps fit f64 exactly for centuries")]
    let unix_seconds = at.timestamp_millis() as f64 / 1000.0;
    let days = (unix_seconds - J2000_UNIX_SECONDS) / SECONDS_PER_DAY;
    let centuries = days / DAYS_PER_JULIAN_CENTURY;
    let degrees = GMST_BASE_DEG
        + GMST_ROTATION_PER_DAY_DEG * days
        + GMST_CORRECTION * centuries * centuries
        - centuries * centuries * centuries / 38_710_000.0;
    degrees.to_radians().rem_euclid(TAU)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_gmst_at_j2000() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((gmst(j2000).to_degrees() - GMST_BASE_DEG).abs() < 1e-6);
    }

    #[test]
    fn test_gmst_advances_one_sidereal_rate() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::hours(1);
        let delta = (gmst(t1) - gmst(t0)).rem_euclid(TAU).to_degrees();
        assert!((delta - SIDEREAL_RATE_DEG_PER_SEC * 3600.0).abs() < 1e-6);
    }

    #[test]
    fn test_gmst_in_range() {
        let t = Utc.with_ymd_and_hms(2031, 7, 19, 5, 43, 11).unwrap();
        let value = gmst(t);
        assert!((0.0..TAU).contains(&value));
    }
}
