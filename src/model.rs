use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Epoch timestamps are day-of-year based: `2025-047T12:00:00.000Z`.
pub const EPOCH_FORMAT: &str = "%Y-%jT%H:%M:%S%.3fZ";

/// One raw scalar as delivered by the upstream feed: the value string plus
/// its unit tag ("km" or "km/s"). Kept verbatim for round-trip fidelity;
/// numeric interpretation happens lazily at computation time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScalarSample {
    pub units: String,
    pub value: String,
}

impl ScalarSample {
    pub fn new(value: &str, units: &str) -> Self {
        Self {
            units: units.to_string(),
            value: value.to_string(),
        }
    }

    /// Parse the raw value as a finite f64.
    fn as_f64(&self, field: &'static str) -> Result<f64, RecordError> {
        match self.value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(RecordError::BadField(field)),
        }
    }
}

/// The Atomic Unit of Orbitrack: one timestamped state vector.
///
/// `epoch` is the unique key and natural sort key. Position is kilometers,
/// velocity km/s, both in the J2000 inertial frame. Serialized field names
/// match the upstream ephemeris (EPOCH, X .. Z_DOT).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EpochRecord {
    #[serde(rename = "EPOCH")]
    pub epoch: String,

    #[serde(rename = "X")]
    pub x: ScalarSample,
    #[serde(rename = "Y")]
    pub y: ScalarSample,
    #[serde(rename = "Z")]
    pub z: ScalarSample,

    #[serde(rename = "X_DOT")]
    pub x_dot: ScalarSample,
    #[serde(rename = "Y_DOT")]
    pub y_dot: ScalarSample,
    #[serde(rename = "Z_DOT")]
    pub z_dot: ScalarSample,
}

impl EpochRecord {
    /// Absolute UTC time of this sample, parsed from the day-of-year epoch
    /// string. Fails with `BadEpoch` on any format deviation.
    pub fn timestamp(&self) -> Result<DateTime<Utc>, RecordError> {
        NaiveDateTime::parse_from_str(&self.epoch, EPOCH_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_| RecordError::BadEpoch(self.epoch.clone()))
    }

    /// Position components in km. All three must parse as finite numbers.
    pub fn position(&self) -> Result<[f64; 3], RecordError> {
        Ok([
            self.x.as_f64("X")?,
            self.y.as_f64("Y")?,
            self.z.as_f64("Z")?,
        ])
    }

    /// Velocity components in km/s. All three must parse as finite numbers.
    pub fn velocity(&self) -> Result<[f64; 3], RecordError> {
        Ok([
            self.x_dot.as_f64("X_DOT")?,
            self.y_dot.as_f64("Y_DOT")?,
            self.z_dot.as_f64("Z_DOT")?,
        ])
    }

    /// Human-readable multi-line summary, unit tags included.
    pub fn summary(&self) -> String {
        format!(
            "Epoch: {}\nX: {} {}\nY: {} {}\nZ: {} {}\nX_DOT: {} {}\nY_DOT: {} {}\nZ_DOT: {} {}\n",
            self.epoch,
            self.x.value, self.x.units,
            self.y.value, self.y.units,
            self.z.value, self.z.units,
            self.x_dot.value, self.x_dot.units,
            self.y_dot.value, self.y_dot.units,
            self.z_dot.value, self.z_dot.units,
        )
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Build a record with the given epoch and velocity, position fixed at a
    /// plausible LEO state vector.
    pub fn record(epoch: &str, vx: &str, vy: &str, vz: &str) -> EpochRecord {
        EpochRecord {
            epoch: epoch.to_string(),
            x: ScalarSample::new("-4945.2", "km"),
            y: ScalarSample::new("-3625.9", "km"),
            z: ScalarSample::new("-2944.8", "km"),
            x_dot: ScalarSample::new(vx, "km/s"),
            y_dot: ScalarSample::new(vy, "km/s"),
            z_dot: ScalarSample::new(vz, "km/s"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::record;
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn epoch_parses_day_of_year() {
        let rec = record("2025-047T12:30:45.000Z", "1.0", "2.0", "3.0");
        let t = rec.timestamp().unwrap();
        assert_eq!(t.year(), 2025);
        assert_eq!(t.ordinal(), 47);
        assert_eq!((t.hour(), t.minute(), t.second()), (12, 30, 45));
    }

    #[test]
    fn epoch_rejects_calendar_format() {
        let rec = record("2025-02-16T12:30:45.000Z", "1.0", "2.0", "3.0");
        assert!(matches!(rec.timestamp(), Err(RecordError::BadEpoch(_))));
    }

    #[test]
    fn velocity_requires_finite_components() {
        let rec = record("2025-001T00:00:00.000Z", "7.0", "abc", "5.0");
        assert!(matches!(rec.velocity(), Err(RecordError::BadField("Y_DOT"))));

        let rec = record("2025-001T00:00:00.000Z", "7.0", "NaN", "5.0");
        assert!(matches!(rec.velocity(), Err(RecordError::BadField("Y_DOT"))));

        let rec = record("2025-001T00:00:00.000Z", "7.0", "3.0", "5.0");
        assert_eq!(rec.velocity().unwrap(), [7.0, 3.0, 5.0]);
    }

    #[test]
    fn serde_round_trip_keeps_upstream_names() {
        let rec = record("2025-001T00:00:00.000Z", "7.0", "3.0", "5.0");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["EPOCH"], "2025-001T00:00:00.000Z");
        assert_eq!(json["X_DOT"]["value"], "7.0");
        assert_eq!(json["X"]["units"], "km");
        let back: EpochRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }
}
