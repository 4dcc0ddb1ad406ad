//! `Point3D` / `Point4D` — position types used by waypoints and by the
//! per-savepoint trajectory capture inside a `ProgEvent`.
use crate::time::TimestampUs;

/// A latitude/longitude/altitude position, with no time component. Used
/// for waypoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl Point3D {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Point3D { lat, lon, alt }
    }

    /// Linear interpolation between `self` and `other` at ratio `t` in
    /// `[0, 1]`, applied independently to each coordinate (no
    /// great-circle correction, per `spec.md` §4.3).
    pub fn lerp(self, other: Point3D, t: f64) -> Point3D {
        Point3D {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
            alt: self.alt + (other.alt - self.alt) * t,
        }
    }
}

/// A position plus a timestamp and the full system state captured at that
/// instant, one element of `ProgEvent::points`.
#[derive(Debug, Clone, PartialEq)]
pub struct Point4D {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub time: TimestampUs,
    pub states: Vec<f64>,
}

impl Point4D {
    pub fn new(position: Point3D, time: TimestampUs, states: Vec<f64>) -> Self {
        Point4D {
            lat: position.lat,
            lon: position.lon,
            alt: position.alt,
            time,
            states,
        }
    }
}
