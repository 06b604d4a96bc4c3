//! Itinerary records as served by the route backend, and their flattening
//! into a single flight plan.

use crate::distance_index::DistanceIndex;
use crate::models::{FlightPlan, GeoPoint, PathSample, WaypointMarker};
use crate::polyline::decode_with_altitude;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegGeometry {
    #[serde(default)]
    pub polyline: Option<String>,
}

/// One routed leg between two huts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(default)]
    pub geometry_polyline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<LegGeometry>,
    #[serde(default, alias = "distance")]
    pub distance_km: Option<f64>,
    #[serde(default, alias = "dplus")]
    pub dplus_m: Option<f64>,
    #[serde(default, alias = "dminus")]
    pub dminus_m: Option<f64>,
}

impl Leg {
    /// Encoded geometry, from either field the backend uses.
    pub fn polyline(&self) -> Option<&str> {
        self.geometry_polyline
            .as_deref()
            .or_else(|| self.geometry.as_ref().and_then(|g| g.polyline.as_deref()))
            .filter(|p| !p.is_empty())
    }
}

/// A hut stop. Legs describe the route from the previous stop to this one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    #[serde(default, alias = "id")]
    pub hut_id: Option<i64>,
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lng", alias = "lon")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default, alias = "isRestDay")]
    pub is_rest_day: bool,
    #[serde(default)]
    pub steps: Vec<Leg>,
    #[serde(default)]
    pub total_distance: Option<f64>,
    #[serde(default)]
    pub elevation_gain: Option<f64>,
    #[serde(default)]
    pub elevation_loss: Option<f64>,
}

impl Stop {
    /// Position when both coordinates are present and non-zero.
    pub fn position(&self) -> Option<GeoPoint> {
        let lat = self.latitude.filter(|v| *v != 0.0 && v.is_finite())?;
        let lon = self.longitude.filter(|v| *v != 0.0 && v.is_finite())?;
        Some(GeoPoint::new(lat, lon))
    }

    /// Altitude when known and above sea level.
    pub fn known_altitude(&self) -> Option<f64> {
        self.altitude.filter(|a| *a > 0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(default, alias = "huts")]
    pub stops: Vec<Stop>,
}

/// Distance and elevation totals for a whole itinerary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTotals {
    pub distance_km: f64,
    pub ascent_m: f64,
    pub descent_m: f64,
}

impl Itinerary {
    pub fn days(&self) -> usize {
        self.stops.len().saturating_sub(1)
    }

    pub fn rest_days(&self) -> usize {
        self.stops.iter().skip(1).filter(|s| s.is_rest_day).count()
    }

    /// Sum the leg records; a stop without legs falls back to its own totals.
    pub fn totals(&self) -> RouteTotals {
        let mut totals = RouteTotals::default();
        for stop in self.stops.iter().skip(1).filter(|s| !s.is_rest_day) {
            if stop.steps.is_empty() {
                totals.distance_km += stop.total_distance.unwrap_or(0.0);
                totals.ascent_m += stop.elevation_gain.unwrap_or(0.0);
                totals.descent_m += stop.elevation_loss.unwrap_or(0.0);
                continue;
            }
            for leg in &stop.steps {
                totals.distance_km += leg.distance_km.unwrap_or(0.0);
                totals.ascent_m += leg.dplus_m.unwrap_or(0.0);
                totals.descent_m += leg.dminus_m.unwrap_or(0.0);
            }
        }
        totals
    }
}

/// Flatten an itinerary into one path with a waypoint marker per travelled stop.
///
/// Rest days add neither geometry nor a marker. A stop whose legs carry no
/// geometry is joined to the previous stop by a straight line when both have
/// coordinates.
pub fn flatten(itinerary: &Itinerary) -> FlightPlan {
    let stops = &itinerary.stops;
    let mut samples: Vec<PathSample> = Vec::new();
    // (stop index, sample count once the stop's geometry is in)
    let mut stop_ends: Vec<(usize, usize)> = Vec::new();

    if let Some(first) = stops.first() {
        if let Some(start) = first.position() {
            samples.push(PathSample::new(start, first.known_altitude()));
        }
        stop_ends.push((0, samples.len()));
    }

    for (i, stop) in stops.iter().enumerate().skip(1) {
        if stop.is_rest_day {
            continue;
        }
        let mut added = false;
        for leg in &stop.steps {
            if let Some(encoded) = leg.polyline() {
                let decoded = decode_with_altitude(encoded);
                added |= !decoded.is_empty();
                samples.extend(decoded);
            }
        }
        if !added && stop.steps.is_empty() {
            if let (Some(from), Some(to)) = (stops[i - 1].position(), stop.position()) {
                samples.push(PathSample::new(from, stops[i - 1].known_altitude()));
                samples.push(PathSample::new(to, stop.known_altitude()));
            }
        }
        stop_ends.push((i, samples.len()));
    }

    let points: Vec<GeoPoint> = samples.iter().map(|s| s.point).collect();
    let index = DistanceIndex::build(&points);
    let waypoints = stop_ends
        .into_iter()
        .map(|(stop_index, count)| WaypointMarker {
            name: stops[stop_index].name.clone(),
            distance_m: if count == 0 {
                0.0
            } else {
                index.distance_at(count - 1)
            },
            day_index: stop_index,
        })
        .collect();

    FlightPlan { samples, waypoints }
}
