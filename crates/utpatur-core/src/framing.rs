//! Overview camera framing for a whole itinerary.

use crate::itinerary::Stop;
use crate::models::{CameraPose, GeoPoint};
use serde::{Deserialize, Serialize};

pub const BOUNDS_MARGIN_DEG: f64 = 0.05;
const KM_PER_DEG: f64 = 111.0;
const MIN_SPAN_DEG: f64 = 0.1;
const MIN_OVERVIEW_HEIGHT_M: f64 = 15_000.0;
const OVERVIEW_PITCH_DEG: f64 = -60.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for Bounds {
    /// Swedish Lapland.
    fn default() -> Self {
        Self {
            min_lat: 67.5,
            max_lat: 69.0,
            min_lon: 17.5,
            max_lon: 20.5,
        }
    }
}

impl Bounds {
    pub fn around(points: impl IntoIterator<Item = GeoPoint>) -> Option<Self> {
        points
            .into_iter()
            .filter(GeoPoint::is_finite)
            .fold(None, |acc: Option<Bounds>, p| {
                Some(match acc {
                    None => Bounds {
                        min_lat: p.lat,
                        max_lat: p.lat,
                        min_lon: p.lon,
                        max_lon: p.lon,
                    },
                    Some(b) => Bounds {
                        min_lat: b.min_lat.min(p.lat),
                        max_lat: b.max_lat.max(p.lat),
                        min_lon: b.min_lon.min(p.lon),
                        max_lon: b.max_lon.max(p.lon),
                    },
                })
            })
    }

    /// Bounds of the located stops plus a margin, or the default region.
    pub fn from_stops(stops: &[Stop]) -> Self {
        Self::around(stops.iter().filter_map(Stop::position))
            .map(|b| b.padded(BOUNDS_MARGIN_DEG))
            .unwrap_or_default()
    }

    pub fn padded(&self, margin_deg: f64) -> Self {
        Self {
            min_lat: self.min_lat - margin_deg,
            max_lat: self.max_lat + margin_deg,
            min_lon: self.min_lon - margin_deg,
            max_lon: self.max_lon + margin_deg,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Pose that frames the bounds from the south, looking north and down.
pub fn overview_pose(bounds: &Bounds) -> CameraPose {
    let center = bounds.center();
    let max_span = bounds.lat_span().max(bounds.lon_span()).max(MIN_SPAN_DEG);
    let height_m = (max_span * KM_PER_DEG * 0.8 * 1000.0).max(MIN_OVERVIEW_HEIGHT_M);
    // the tilted camera sits south of what it looks at
    let position = GeoPoint::new(center.lat - bounds.lat_span() * 0.7, center.lon);
    CameraPose::looking(position, height_m, 0.0, OVERVIEW_PITCH_DEG)
}
