//! Core data models shared by the path, terrain and flight modules.

use serde::{Deserialize, Serialize};

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Linear interpolation in degree space, `t` in [0, 1].
    pub fn lerp(&self, other: &GeoPoint, t: f64) -> GeoPoint {
        GeoPoint {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }
}

/// A decoded path sample, optionally carrying the altitude channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSample {
    pub point: GeoPoint,
    /// Altitude in meters when the encoded path carried one.
    #[serde(default)]
    pub altitude_m: Option<f64>,
}

impl PathSample {
    pub const fn new(point: GeoPoint, altitude_m: Option<f64>) -> Self {
        Self { point, altitude_m }
    }
}

/// A named, itinerary-significant stop along the flattened route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointMarker {
    pub name: String,
    /// Cumulative distance from the start of the route in meters.
    pub distance_m: f64,
    pub day_index: usize,
}

/// Absolute camera pose sent to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: GeoPoint,
    /// Height above the ellipsoid in meters.
    pub height_m: f64,
    /// Degrees clockwise from north.
    pub heading_deg: f64,
    /// Degrees, negative looks down.
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

impl CameraPose {
    pub fn looking(position: GeoPoint, height_m: f64, heading_deg: f64, pitch_deg: f64) -> Self {
        Self {
            position,
            height_m,
            heading_deg,
            pitch_deg,
            roll_deg: 0.0,
        }
    }
}

/// Everything the flight engine needs from an itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub samples: Vec<PathSample>,
    pub waypoints: Vec<WaypointMarker>,
}

impl FlightPlan {
    pub fn points(&self) -> Vec<GeoPoint> {
        self.samples.iter().map(|s| s.point).collect()
    }
}
