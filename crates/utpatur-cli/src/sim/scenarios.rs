//! Built-in itineraries for flying without a saved trip.
//!
//! Hut positions are close to the real ones; leg geometry is synthetic, a
//! gently meandering line with a pass between each pair of huts.

use clap::ValueEnum;
use std::f64::consts::PI;
use utpatur_core::spatial::{bearing_deg, distance_between, offset_by_bearing};
use utpatur_core::{encode, GeoPoint, Itinerary, Leg, PathSample, Stop};

const POINTS_PER_KM: f64 = 8.0;
const MEANDER_M: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoRoute {
    /// Abisko south along Kungsleden to Sälka, with a rest day at Alesjaure
    Kungsleden,
    /// Nikkaluokta to Singi via Kebnekaise, the first day without geometry
    Kebnekaise,
    /// Kebnekaise to Singi and back
    Loop,
}

impl DemoRoute {
    pub fn itinerary(self) -> Itinerary {
        match self {
            DemoRoute::Kungsleden => create_kungsleden_scenario(),
            DemoRoute::Kebnekaise => create_kebnekaise_scenario(),
            DemoRoute::Loop => create_loop_scenario(),
        }
    }
}

struct Hut {
    name: &'static str,
    id: i64,
    lat: f64,
    lon: f64,
    altitude_m: f64,
}

const ABISKO: Hut = Hut { name: "Abisko Turiststation", id: 1, lat: 68.3580, lon: 18.7830, altitude_m: 385.0 };
const ABISKOJAURE: Hut = Hut { name: "Abiskojaure", id: 2, lat: 68.2930, lon: 18.5640, altitude_m: 490.0 };
const ALESJAURE: Hut = Hut { name: "Alesjaure", id: 3, lat: 68.1370, lon: 18.4100, altitude_m: 780.0 };
const TJAKTJA: Hut = Hut { name: "Tjäktja", id: 4, lat: 68.0640, lon: 18.3330, altitude_m: 1_000.0 };
const SALKA: Hut = Hut { name: "Sälka", id: 5, lat: 67.9970, lon: 18.3000, altitude_m: 830.0 };
const SINGI: Hut = Hut { name: "Singi", id: 6, lat: 67.9560, lon: 18.4140, altitude_m: 720.0 };
const KEBNEKAISE: Hut = Hut { name: "Kebnekaise fjällstation", id: 7, lat: 67.8830, lon: 18.6150, altitude_m: 690.0 };
const NIKKALUOKTA: Hut = Hut { name: "Nikkaluokta", id: 8, lat: 67.8510, lon: 19.0150, altitude_m: 470.0 };

/// Five travel days and one rest day along the northern Kungsleden.
pub fn create_kungsleden_scenario() -> Itinerary {
    Itinerary {
        stops: vec![
            start(&ABISKO),
            travel(&ABISKO, &ABISKOJAURE, 120.0),
            travel(&ABISKOJAURE, &ALESJAURE, 260.0),
            rest(&ALESJAURE),
            travel(&ALESJAURE, &TJAKTJA, 180.0),
            travel(&TJAKTJA, &SALKA, 150.0),
        ],
    }
}

/// The first day only has hut coordinates, so it flies as a straight line.
pub fn create_kebnekaise_scenario() -> Itinerary {
    let mut walk_in = travel(&NIKKALUOKTA, &KEBNEKAISE, 0.0);
    walk_in.steps.clear();
    walk_in.total_distance = Some(19.0);
    walk_in.elevation_gain = Some(320.0);
    walk_in.elevation_loss = Some(100.0);

    Itinerary {
        stops: vec![
            start(&NIKKALUOKTA),
            walk_in,
            travel(&KEBNEKAISE, &SINGI, 200.0),
        ],
    }
}

/// Out and back; the start hut is visited twice.
pub fn create_loop_scenario() -> Itinerary {
    Itinerary {
        stops: vec![
            start(&KEBNEKAISE),
            travel(&KEBNEKAISE, &SINGI, 200.0),
            travel(&SINGI, &KEBNEKAISE, 200.0),
        ],
    }
}

fn stop_at(hut: &Hut) -> Stop {
    Stop {
        name: hut.name.to_string(),
        hut_id: Some(hut.id),
        latitude: Some(hut.lat),
        longitude: Some(hut.lon),
        altitude: Some(hut.altitude_m),
        ..Stop::default()
    }
}

fn start(hut: &Hut) -> Stop {
    stop_at(hut)
}

fn rest(hut: &Hut) -> Stop {
    Stop {
        is_rest_day: true,
        ..stop_at(hut)
    }
}

fn travel(from: &Hut, to: &Hut, pass_m: f64) -> Stop {
    Stop {
        steps: vec![synthetic_leg(from, to, pass_m)],
        ..stop_at(to)
    }
}

/// Meander from hut to hut, rising `pass_m` above the straight altitude
/// line midway.
fn synthetic_leg(from: &Hut, to: &Hut, pass_m: f64) -> Leg {
    let a = GeoPoint::new(from.lat, from.lon);
    let b = GeoPoint::new(to.lat, to.lon);
    let straight_m = distance_between(&a, &b);
    let heading = bearing_deg(&a, &b);
    let count = ((straight_m / 1_000.0 * POINTS_PER_KM).ceil() as usize).max(2);

    let samples: Vec<PathSample> = (0..=count)
        .map(|i| {
            let t = i as f64 / count as f64;
            let hump = (PI * t).sin();
            // two full wiggles per leg, pinned at both huts
            let sideways = MEANDER_M * (2.0 * PI * 2.0 * t).sin() * hump;
            let on_line = a.lerp(&b, t);
            let point = offset_by_bearing(&on_line, sideways, heading + 90.0);
            let altitude = from.altitude_m + (to.altitude_m - from.altitude_m) * t + pass_m * hump;
            PathSample::new(point, Some(altitude))
        })
        .collect();

    let mut distance_m = 0.0;
    let (mut dplus, mut dminus) = (0.0, 0.0);
    for pair in samples.windows(2) {
        distance_m += distance_between(&pair[0].point, &pair[1].point);
        let climb = pair[1].altitude_m.unwrap_or(0.0) - pair[0].altitude_m.unwrap_or(0.0);
        if climb > 0.0 {
            dplus += climb;
        } else {
            dminus -= climb;
        }
    }

    Leg {
        geometry_polyline: Some(encode(&samples)),
        distance_km: Some(distance_m / 1_000.0),
        dplus_m: Some(dplus.round()),
        dminus_m: Some(dminus.round()),
        ..Leg::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utpatur_core::{build_profile, flatten, ProfileAxis};

    #[test]
    fn every_demo_route_flattens_to_a_flyable_plan() {
        for route in [DemoRoute::Kungsleden, DemoRoute::Kebnekaise, DemoRoute::Loop] {
            let itinerary = route.itinerary();
            let plan = flatten(&itinerary);
            assert!(plan.samples.len() >= 2, "{route:?} is too short");
            assert!(
                plan.waypoints
                    .windows(2)
                    .all(|w| w[0].distance_m <= w[1].distance_m),
                "{route:?} waypoints out of order"
            );
            assert!(build_profile(&itinerary).is_some());
        }
    }

    #[test]
    fn kungsleden_rest_day_adds_no_marker() {
        let itinerary = create_kungsleden_scenario();
        assert_eq!(itinerary.days(), 5);
        assert_eq!(itinerary.rest_days(), 1);

        let plan = flatten(&itinerary);
        let names: Vec<&str> = plan.waypoints.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(
            names,
            ["Abisko Turiststation", "Abiskojaure", "Alesjaure", "Tjäktja", "Sälka"]
        );
    }

    #[test]
    fn synthetic_legs_report_their_own_totals() {
        let totals = create_kungsleden_scenario().totals();
        // hut to hut is about 46 km in straight lines
        assert!(totals.distance_km > 40.0 && totals.distance_km < 70.0);
        assert!(totals.ascent_m > totals.descent_m);
    }

    #[test]
    fn kebnekaise_walk_in_falls_back_to_stop_totals() {
        let totals = create_kebnekaise_scenario().totals();
        assert!(totals.distance_km > 19.0);
        let plan = flatten(&create_kebnekaise_scenario());
        // straight line pair, then the meandering second day
        assert_eq!(plan.waypoints[1].name, "Kebnekaise fjällstation");
        assert!(plan.waypoints[1].distance_m > 15_000.0);
    }

    #[test]
    fn loop_midpoint_on_the_profile_is_the_turnaround_hut() {
        let profile = build_profile(&create_loop_scenario()).unwrap();
        let axis = ProfileAxis::from_points(&profile).unwrap();
        let km = axis.distance_at_ratio(0.5);
        let hut = axis
            .nearest_hut(&profile, km)
            .and_then(|p| p.hut.as_ref())
            .map(|h| h.name.as_str());
        assert_eq!(hut, Some("Singi"));
        assert_eq!(axis.distance_at_ratio(1.0), axis.x_max_km);
    }
}
