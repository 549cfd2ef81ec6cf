//! Geodesy and geocoding at the edge of the core.
//!
//! The inertial-to-Earth-fixed transform is a black box behind the
//! `FrameTransform` trait with a fixed contract: Cartesian km + UTC time in,
//! geodetic degrees/km out, failable. The default `GmstRotation` impl spins
//! the J2000 frame by Greenwich Mean Sidereal Time and converts WGS84
//! ECEF to geodetic; it ignores precession/nutation/polar motion, which is
//! sub-degree for LEO ground tracks. Reverse geocoding is a slow external
//! HTTP capability and degrades to `None` on any failure or timeout.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::GeoError;

// WGS84 ellipsoid
const WGS84_A_KM: f64 = 6378.137;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Geodetic position: latitude/longitude in degrees, altitude in km above
/// the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geodetic {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Contract for the external geodesy capability (spec'd black box).
pub trait FrameTransform: Send + Sync {
    /// Project an inertial-frame position at `at` onto the rotating Earth.
    fn to_geodetic(&self, position_km: [f64; 3], at: DateTime<Utc>) -> Result<Geodetic, GeoError>;
}

/// Earth-rotation-only implementation of the transform.
pub struct GmstRotation;

impl FrameTransform for GmstRotation {
    fn to_geodetic(&self, position_km: [f64; 3], at: DateTime<Utc>) -> Result<Geodetic, GeoError> {
        if position_km.iter().any(|c| !c.is_finite()) {
            return Err(GeoError::OutOfDomain);
        }
        // A position at the geocenter has no defined ground point.
        if position_km.iter().all(|c| c.abs() < 1e-9) {
            return Err(GeoError::OutOfDomain);
        }

        let theta = gmst_degrees(julian_date(at)).to_radians();
        let ecef = rotate_to_ecef(position_km, theta);
        Ok(ecef_to_geodetic(ecef))
    }
}

/// Julian date of a UTC instant.
fn julian_date(at: DateTime<Utc>) -> f64 {
    let unix = at.timestamp() as f64 + f64::from(at.timestamp_subsec_millis()) / 1000.0;
    unix / 86_400.0 + 2_440_587.5
}

/// Greenwich Mean Sidereal Time in degrees (IAU 1982 series).
fn gmst_degrees(jd: f64) -> f64 {
    let d = jd - 2_451_545.0;
    let t = d / 36_525.0;
    let gmst = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    gmst.rem_euclid(360.0)
}

/// Rotate an inertial position about the Earth's spin axis by `theta` rad.
fn rotate_to_ecef(p: [f64; 3], theta: f64) -> [f64; 3] {
    let (sin_t, cos_t) = theta.sin_cos();
    [
        p[0] * cos_t + p[1] * sin_t,
        -p[0] * sin_t + p[1] * cos_t,
        p[2],
    ]
}

/// WGS84 ECEF (km) to geodetic, iterative latitude refinement.
fn ecef_to_geodetic(ecef: [f64; 3]) -> Geodetic {
    let [x, y, z] = ecef;
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let p = (x * x + y * y).sqrt();

    let longitude = y.atan2(x).to_degrees();

    // Near the poles p vanishes and the general iteration degenerates.
    if p < 1e-9 {
        let b = WGS84_A_KM * (1.0 - WGS84_F);
        return Geodetic {
            latitude: 90.0_f64.copysign(z),
            longitude,
            altitude: z.abs() - b,
        };
    }

    let mut latitude = (z / (p * (1.0 - e2))).atan();
    let mut altitude = 0.0;
    for _ in 0..5 {
        let sin_lat = latitude.sin();
        let n = WGS84_A_KM / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        altitude = p / latitude.cos() - n;
        latitude = (z / (p * (1.0 - e2 * n / (n + altitude)))).atan();
    }

    Geodetic {
        latitude: latitude.to_degrees(),
        longitude,
        altitude,
    }
}

// --- REVERSE GEOCODING ---

/// Narrow interface to the Nominatim reverse geocoder.
///
/// Failures, timeouts and empty results all come back as `None`; the caller
/// substitutes the "Unknown" sentinel. The per-request timeout lives on the
/// client so a stuck upstream can never hang a query.
pub struct NominatimClient {
    http: reqwest::Client,
    endpoint: String,
}

impl NominatimClient {
    pub const DEFAULT_ENDPOINT: &'static str = "https://nominatim.openstreetmap.org";

    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("orbitrack/0.1")
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Look up a human-readable address for a ground point.
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> Option<String> {
        let url = format!(
            "{}/reverse?lat={latitude:.5}&lon={longitude:.5}&zoom=15&format=jsonv2&accept-language=en",
            self.endpoint
        );

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("reverse geocode request failed: {e}");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("reverse geocode returned HTTP {}", response.status());
            return None;
        }

        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!("reverse geocode returned unparseable body: {e}");
                return None;
            }
        };

        let address = body.get("display_name")?.as_str()?.to_string();
        debug!(latitude, longitude, "resolved ground address");
        Some(address)
    }
}
