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

//! Simplified orbital propagation.
//!
//! Two-body Keplerian motion from mean elements: no drag, no J2, no SGP4
//! perturbations. Good enough to place a marker on the right ground track
//! between element refreshes.
//!
//! The inertial longitude must be rotated into the Earth-fixed frame by the
//! Greenwich sidereal angle at the query time. Skipping that step produces a
//! plausible track that drifts west-to-east by ~15° per hour of elapsed time.

pub mod sidereal;

use std::f64::consts::TAU;

use chrono::{DateTime, Utc};

use crate::error::PropagationError;

pub use sidereal::gmst;

/// Standard gravitational parameter of Earth, km³/s².
pub const EARTH_MU_KM3_S2: f64 = 398_600.441_8;
/// Mean Earth radius used for altitude, km.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

const SECONDS_PER_DAY: f64 = 86_400.0;
const KEPLER_TOLERANCE_RAD: f64 = 1e-6;
const KEPLER_MAX_ITERATIONS: usize = 10;

/// Mean orbital elements from one two-line element set.
///
/// Angles are in degrees, mean motion in revolutions per day.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalElements {
    pub catalog_number: u32,
    pub name: String,
    pub epoch: DateTime<Utc>,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub eccentricity: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    pub mean_motion_rev_per_day: f64,
}

impl OrbitalElements {
    /// Orbital period in seconds.
    #[must_use]
    pub fn period_seconds(&self) -> f64 {
        SECONDS_PER_DAY / self.mean_motion_rev_per_day
    }

    fn validate(&self) -> Result<(), PropagationError> {
        if !self.mean_motion_rev_per_day.is_finite() || self.mean_motion_rev_per_day <= 0.0 {
            return Err(PropagationError::InvalidMeanMotion(self.mean_motion_rev_per_day));
        }
        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(PropagationError::InvalidEccentricity(self.eccentricity));
        }
        Ok(())
    }
}

/// Geodetic sub-point on a spherical Earth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
}

/// Earth-centered inertial position, km.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EciPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EciPosition {
    #[must_use]
    pub fn radius_km(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Sub-point after rotating the inertial frame by `sidereal_angle` radians.
    #[must_use]
    pub fn to_sub_point(&self, sidereal_angle: f64) -> SubPoint {
        let latitude = self.z.atan2(self.x.hypot(self.y)).to_degrees();
        let inertial_lon = self.y.atan2(self.x);
        SubPoint {
            latitude,
            longitude: wrap_longitude((inertial_lon - sidereal_angle).to_degrees()),
            altitude_km: self.radius_km() - EARTH_RADIUS_KM,
        }
    }
}

/// Ground sub-point of `elements` at `at`.
pub fn propagate(elements: &OrbitalElements, at: DateTime<Utc>) -> Result<SubPoint, PropagationError> {
    let eci = inertial_position(elements, at)?;
    Ok(eci.to_sub_point(gmst(at)))
}

/// Inertial position of `elements` at `at`, before any Earth rotation.
pub fn inertial_position(
    elements: &OrbitalElements,
    at: DateTime<Utc>,
) -> Result<EciPosition, PropagationError> {
    elements.validate()?;

    #[allow(clippy::cast_precision_loss, reason = "elapsed milliseconds stay far below 2^52")]
    let elapsed = (at - elements.epoch).num_milliseconds() as f64 / 1000.0;
    let mean_motion = elements.mean_motion_rev_per_day * TAU / SECONDS_PER_DAY;
    let mean_anomaly = (elements.mean_anomaly_deg.to_radians() + mean_motion * elapsed).rem_euclid(TAU);

    let e = elements.eccentricity;
    let eccentric_anomaly = solve_kepler(mean_anomaly, e);

    let semi_major_axis = (EARTH_MU_KM3_S2 / (mean_motion * mean_motion)).cbrt();
    let radius = semi_major_axis * (1.0 - e * eccentric_anomaly.cos());
    let true_anomaly = 2.0
        * ((1.0 + e).sqrt() * (eccentric_anomaly / 2.0).sin())
            .atan2((1.0 - e).sqrt() * (eccentric_anomaly / 2.0).cos());

    let inclination = elements.inclination_deg.to_radians();
    let raan = elements.raan_deg.to_radians();
    let argument_of_latitude = elements.arg_perigee_deg.to_radians() + true_anomaly;

    let (sin_u, cos_u) = argument_of_latitude.sin_cos();
    let (sin_raan, cos_raan) = raan.sin_cos();
    let (sin_i, cos_i) = inclination.sin_cos();

    Ok(EciPosition {
        x: radius * (cos_raan * cos_u - sin_raan * sin_u * cos_i),
        y: radius * (sin_raan * cos_u + cos_raan * sin_u * cos_i),
        z: radius * sin_u * sin_i,
    })
}

/// Newton iteration on `E - e sin E = M`.
fn solve_kepler(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let mut e_anom = if eccentricity < 0.8 { mean_anomaly } else { std::f64::consts::PI };
    for _ in 0..KEPLER_MAX_ITERATIONS {
        let f = e_anom - eccentricity * e_anom.sin() - mean_anomaly;
        let step = f / (1.0 - eccentricity * e_anom.cos());
        e_anom -= step;
        if step.abs() < KEPLER_TOLERANCE_RAD {
            break;
        }
    }
    e_anom
}

/// Wrap a longitude into `[-180, 180)`.
#[must_use]
pub fn wrap_longitude(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}
