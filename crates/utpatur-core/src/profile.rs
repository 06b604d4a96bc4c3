//! Elevation profile of an itinerary and the chart axis that maps clicks
//! back to distances along the route.

use crate::itinerary::{Itinerary, Stop};
use crate::models::GeoPoint;
use crate::polyline::decode_with_altitude;
use crate::spatial::distance_between;
use serde::{Deserialize, Serialize};

/// Fallback altitude when nothing better is known (m).
const DEFAULT_ALTITUDE_M: f64 = 500.0;
const MAX_PLAUSIBLE_ALTITUDE_M: f64 = 5_000.0;
/// Hut markers are matched within this share of the profile length.
const HUT_MATCH_RATIO: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileHut {
    pub name: String,
    pub hut_id: Option<i64>,
    pub stop_index: usize,
    pub position: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub distance_km: f64,
    pub altitude_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hut: Option<ProfileHut>,
}

fn km_between(a: &GeoPoint, b: &GeoPoint) -> f64 {
    distance_between(a, b) / 1000.0
}

/// Build the distance/altitude profile of an itinerary.
///
/// Returns `None` when fewer than two plausible points remain.
pub fn build_profile(itinerary: &Itinerary) -> Option<Vec<ProfilePoint>> {
    let stops = &itinerary.stops;
    if stops.len() < 2 {
        return None;
    }

    let mut points: Vec<ProfilePoint> = Vec::new();
    let mut cumulative_km = 0.0;

    for (i, stop) in stops.iter().enumerate() {
        if i > 0 && stop.is_rest_day {
            continue;
        }
        if i > 0 {
            let had_altitude = push_leg_points(stop, &mut points, &mut cumulative_km);
            if !had_altitude {
                push_synthetic_leg(&stops[i - 1], stop, &mut points, &mut cumulative_km);
            }
        }

        let altitude_m = stop
            .known_altitude()
            .or_else(|| {
                if i == 0 {
                    stops.get(1).and_then(first_leg_altitude)
                } else {
                    None
                }
            })
            .or_else(|| points.last().map(|p| p.altitude_m))
            .filter(|a| *a > 0.0)
            .unwrap_or(DEFAULT_ALTITUDE_M);

        points.push(ProfilePoint {
            distance_km: if i == 0 { 0.0 } else { cumulative_km },
            altitude_m,
            position: stop.position(),
            hut: Some(ProfileHut {
                name: stop.name.clone(),
                hut_id: stop.hut_id,
                stop_index: i,
                position: stop.position(),
            }),
        });
    }

    points.retain(|p| p.altitude_m > 0.0 && p.altitude_m < MAX_PLAUSIBLE_ALTITUDE_M);
    points.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    (points.len() >= 2).then_some(points)
}

/// Append every point of legs that carry altitude; returns whether any did.
fn push_leg_points(stop: &Stop, points: &mut Vec<ProfilePoint>, cumulative_km: &mut f64) -> bool {
    let mut had_altitude = false;
    for leg in &stop.steps {
        let Some(encoded) = leg.polyline() else {
            continue;
        };
        let samples = decode_with_altitude(encoded);
        let with_altitude = samples
            .iter()
            .filter(|s| s.altitude_m.is_some_and(|a| a != 0.0))
            .count();
        // mostly-zero altitude channels are treated as missing
        let usable = with_altitude * 2 > samples.len();
        had_altitude |= usable;

        for (j, sample) in samples.iter().enumerate() {
            if j > 0 {
                *cumulative_km += km_between(&samples[j - 1].point, &sample.point);
            }
            if usable {
                points.push(ProfilePoint {
                    distance_km: *cumulative_km,
                    altitude_m: sample.altitude_m.unwrap_or(0.0),
                    position: Some(sample.point),
                    hut: None,
                });
            }
        }
    }
    had_altitude
}

/// Rise-then-fall stand-in for a leg without altitude data.
fn push_synthetic_leg(
    previous: &Stop,
    stop: &Stop,
    points: &mut Vec<ProfilePoint>,
    cumulative_km: &mut f64,
) {
    let start_alt = previous
        .known_altitude()
        .or_else(|| points.last().map(|p| p.altitude_m))
        .unwrap_or(DEFAULT_ALTITUDE_M);
    let leg_km = stop.total_distance.unwrap_or(0.0).max(0.0);
    let gain = stop.elevation_gain.unwrap_or(0.0);
    let loss = stop.elevation_loss.unwrap_or(0.0);
    let peak_alt = start_alt + gain;
    let peak_at = if gain + loss > 0.0 {
        gain / (gain + loss)
    } else {
        0.5
    };
    let count = ((leg_km * 2.0).ceil() as usize).max(10);
    let start_km = *cumulative_km;

    for j in 1..=count {
        let ratio = j as f64 / count as f64;
        let altitude_m = if ratio <= peak_at {
            let climb = if peak_at > 0.0 { ratio / peak_at } else { 0.0 };
            start_alt + gain * climb
        } else {
            let descent = if peak_at < 1.0 {
                (ratio - peak_at) / (1.0 - peak_at)
            } else {
                1.0
            };
            peak_alt - loss * descent
        };
        points.push(ProfilePoint {
            distance_km: start_km + leg_km * ratio,
            altitude_m,
            position: None,
            hut: None,
        });
    }
    *cumulative_km += leg_km;
}

fn first_leg_altitude(next: &Stop) -> Option<f64> {
    if next.is_rest_day {
        return None;
    }
    let encoded = next.steps.first()?.polyline()?;
    decode_with_altitude(encoded)
        .first()
        .and_then(|s| s.altitude_m)
        .filter(|a| *a > 0.0)
}

/// Chart axis of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileAxis {
    pub y_min: f64,
    pub y_max: f64,
    pub tick_step: f64,
    pub x_max_km: f64,
}

impl ProfileAxis {
    pub fn from_points(points: &[ProfilePoint]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let (min_alt, max_alt) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, p| {
            (acc.0.min(p.altitude_m), acc.1.max(p.altitude_m))
        });
        let padding = ((max_alt - min_alt) * 0.1).max(30.0);
        let y_min = ((min_alt - padding) / 50.0).floor() * 50.0;
        let y_max = ((max_alt + padding) / 50.0).ceil() * 50.0;
        let y_range = y_max - y_min;
        let tick_step = if y_range <= 200.0 {
            50.0
        } else if y_range <= 500.0 {
            100.0
        } else {
            200.0
        };
        let x_max_km = points.last().map(|p| p.distance_km).unwrap_or(0.0);
        Some(Self {
            y_min,
            y_max,
            tick_step,
            x_max_km,
        })
    }

    pub fn ticks(&self) -> Vec<f64> {
        let mut ticks = Vec::new();
        let mut y = self.y_min;
        while y <= self.y_max {
            ticks.push(y);
            y += self.tick_step;
        }
        ticks
    }

    /// Distance (km) under a horizontal chart position in [0, 1].
    pub fn distance_at_ratio(&self, ratio: f64) -> f64 {
        if !ratio.is_finite() {
            return 0.0;
        }
        ratio.clamp(0.0, 1.0) * self.x_max_km
    }

    /// Closest hut point within 2% of the profile length.
    pub fn nearest_hut<'a>(
        &self,
        points: &'a [ProfilePoint],
        distance_km: f64,
    ) -> Option<&'a ProfilePoint> {
        let reach = self.x_max_km * HUT_MATCH_RATIO;
        points
            .iter()
            .filter(|p| p.hut.is_some())
            .map(|p| ((p.distance_km - distance_km).abs(), p))
            .filter(|(gap, _)| *gap < reach)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, p)| p)
    }
}

/// Group thousands with an apostrophe, e.g. `12'345`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('\'');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::Leg;
    use crate::models::PathSample;
    use crate::polyline::encode;

    fn stop(name: &str, lat: f64, lon: f64, altitude: Option<f64>) -> Stop {
        Stop {
            name: name.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            altitude,
            ..Stop::default()
        }
    }

    fn leg(points: &[(f64, f64, f64)]) -> Leg {
        let samples: Vec<PathSample> = points
            .iter()
            .map(|(lat, lon, alt)| PathSample::new(GeoPoint::new(*lat, *lon), Some(*alt)))
            .collect();
        Leg {
            geometry_polyline: Some(encode(&samples)),
            ..Leg::default()
        }
    }

    #[test]
    fn uses_polyline_altitudes_when_present() {
        let mut next = stop("Abiskojaure", 68.30, 18.70, Some(490.0));
        next.steps = vec![leg(&[
            (68.358, 18.782, 390.0),
            (68.33, 18.75, 450.0),
            (68.30, 18.70, 490.0),
        ])];
        let itinerary = Itinerary {
            stops: vec![stop("Abisko", 68.358, 18.782, None), next],
        };
        let profile = build_profile(&itinerary).unwrap();
        assert_eq!(profile.len(), 5);
        // first hut picks up the first altitude of the next leg
        assert_eq!(profile[0].altitude_m, 390.0);
        assert!(profile[0].hut.is_some());
        let last = profile.last().unwrap();
        assert_eq!(last.hut.as_ref().map(|h| h.stop_index), Some(1));
        assert!(profile.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[test]
    fn synthesizes_rise_then_fall_without_altitudes() {
        let next = Stop {
            total_distance: Some(10.0),
            elevation_gain: Some(300.0),
            elevation_loss: Some(100.0),
            ..stop("Alesjaure", 68.10, 18.40, None)
        };
        let itinerary = Itinerary {
            stops: vec![stop("Abiskojaure", 68.30, 18.70, Some(500.0)), next],
        };
        let profile = build_profile(&itinerary).unwrap();
        // hut + 20 synthetic points + hut
        assert_eq!(profile.len(), 22);
        let peak = profile
            .iter()
            .map(|p| p.altitude_m)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(peak, 800.0);
        let end = profile.last().unwrap();
        assert_eq!(end.distance_km, 10.0);
        assert_eq!(end.altitude_m, 700.0);
    }

    #[test]
    fn mostly_zero_altitudes_count_as_missing() {
        let mut next = stop("Sälka", 68.0, 18.5, Some(830.0));
        next.steps = vec![leg(&[(68.1, 18.6, 0.0), (68.05, 18.55, 0.0), (68.0, 18.5, 830.0)])];
        let itinerary = Itinerary {
            stops: vec![stop("Tjäktja", 68.1, 18.6, Some(1_000.0)), next],
        };
        let profile = build_profile(&itinerary).unwrap();
        assert!(profile.iter().all(|p| p.altitude_m > 0.0));
        // synthetic leg of zero length: hut, 10 stand-ins, hut
        assert_eq!(profile.len(), 12);
    }

    #[test]
    fn too_few_points_yield_none() {
        assert!(build_profile(&Itinerary::default()).is_none());
        let single = Itinerary {
            stops: vec![stop("Abisko", 68.358, 18.782, Some(390.0))],
        };
        assert!(build_profile(&single).is_none());
    }

    fn hut_point(name: &str, distance_km: f64, altitude_m: f64) -> ProfilePoint {
        ProfilePoint {
            distance_km,
            altitude_m,
            position: None,
            hut: Some(ProfileHut {
                name: name.to_string(),
                hut_id: None,
                stop_index: 0,
                position: None,
            }),
        }
    }

    #[test]
    fn axis_pads_and_rounds() {
        let points = vec![hut_point("A", 0.0, 412.0), hut_point("B", 40.0, 1_133.0)];
        let axis = ProfileAxis::from_points(&points).unwrap();
        assert_eq!(axis.y_min, 300.0);
        assert_eq!(axis.y_max, 1_250.0);
        assert_eq!(axis.tick_step, 200.0);
        assert_eq!(axis.ticks().first(), Some(&300.0));
        assert_eq!(axis.distance_at_ratio(0.25), 10.0);
        assert_eq!(axis.distance_at_ratio(7.0), 40.0);
    }

    #[test]
    fn nearest_hut_within_two_percent() {
        let points = vec![
            hut_point("Abisko", 0.0, 390.0),
            hut_point("Abiskojaure", 50.0, 490.0),
            hut_point("Alesjaure", 100.0, 780.0),
        ];
        let axis = ProfileAxis::from_points(&points).unwrap();
        let near = axis.nearest_hut(&points, 51.5).and_then(|p| p.hut.as_ref());
        assert_eq!(near.map(|h| h.name.as_str()), Some("Abiskojaure"));
        assert!(axis.nearest_hut(&points, 53.0).is_none());
    }

    #[test]
    fn thousands_use_apostrophes() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.4), "999");
        assert_eq!(format_thousands(1_234.0), "1'234");
        assert_eq!(format_thousands(1_234_567.8), "1'234'568");
        assert_eq!(format_thousands(-12_500.0), "-12'500");
    }
}
