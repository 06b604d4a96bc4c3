//! Camera flight along a route.
//!
//! A [`FlightSession`] owns everything one flight needs: the decoded path,
//! its distance index, the waypoint markers, the terrain cache and the
//! mutable [`FlightState`]. Time is passed in explicitly as the duration
//! since some fixed origin, so the whole state machine runs deterministically
//! without a rendering loop.

use crate::distance_index::{DistanceIndex, PathLocation};
use crate::models::{CameraPose, GeoPoint, WaypointMarker};
use crate::spatial::{bearing_deg, lerp_bearing, offset_by_bearing};
use crate::terrain_cache::TerrainHeightCache;
use crate::tuning::FlightTuning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Shorter runs than this are treated as no run when estimating slope or heading.
const MIN_PROBE_RUN_M: f64 = 1.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlightError {
    #[error("path has {points} point(s), at least 2 are needed to fly")]
    DegeneratePath { points: usize },
    #[error("path has zero length")]
    ZeroLength,
}

/// Controller-level lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    #[default]
    Idle,
    Initializing,
    Flying(FlyingMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlyingMode {
    Running,
    Paused,
    /// Holding at a reached waypoint until the pause elapses
    WaypointPaused,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeKind {
    Climbing,
    Descending,
    #[default]
    Flat,
}

/// Slope-adaptive camera offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveOffsets {
    pub height_bonus_m: f64,
    pub setback_bonus_m: f64,
    pub pitch_offset_deg: f64,
}

impl AdaptiveOffsets {
    fn approach(&mut self, target: &AdaptiveOffsets, factor: f64) {
        self.height_bonus_m += (target.height_bonus_m - self.height_bonus_m) * factor;
        self.setback_bonus_m += (target.setback_bonus_m - self.setback_bonus_m) * factor;
        self.pitch_offset_deg += (target.pitch_offset_deg - self.pitch_offset_deg) * factor;
    }
}

/// Mutable per-session flight state.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightState {
    pub current_distance_m: f64,
    pub location: PathLocation,
    pub bearing_deg: f64,
    pub camera_height_m: Option<f64>,
    pub adaptive: AdaptiveOffsets,
    /// Indices into the waypoint list that already triggered (or were skipped by a seek)
    pub visited: BTreeSet<usize>,
    pub pause_until: Option<Duration>,
    /// Timestamp of the previous tick; `None` means the next tick counts zero elapsed time
    pub last_tick: Option<Duration>,
    pub mode: FlyingMode,
    pub speed_multiplier: u32,
}

impl FlightState {
    fn new(bearing_deg: f64, speed_multiplier: u32) -> Self {
        Self {
            current_distance_m: 0.0,
            location: PathLocation::START,
            bearing_deg,
            camera_height_m: None,
            adaptive: AdaptiveOffsets::default(),
            visited: BTreeSet::new(),
            pause_until: None,
            last_tick: None,
            mode: FlyingMode::Paused,
            speed_multiplier: speed_multiplier.max(1),
        }
    }
}

/// One rendered frame of the flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightFrame {
    pub camera: CameraPose,
    /// Exact interpolated ground position of the hiker
    pub hiker: GeoPoint,
    pub distance_km: f64,
    pub percent: f64,
    pub slope_deg: f64,
    pub slope: SlopeKind,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Paused by the user; nothing advanced
    Paused,
    /// A waypoint pause is still running
    Holding,
    /// A waypoint was reached and a pause started
    WaypointReached(WaypointMarker),
    Frame(FlightFrame),
    /// The end of the path was reached
    Finished,
}

/// Read-only inputs of a tick.
#[derive(Debug, Clone, Copy)]
pub struct FlightContext<'a> {
    pub points: &'a [GeoPoint],
    pub index: &'a DistanceIndex,
    pub waypoints: &'a [WaypointMarker],
    pub terrain: &'a TerrainHeightCache,
    pub tuning: &'a FlightTuning,
}

impl FlightContext<'_> {
    fn position_at(&self, distance_m: f64) -> GeoPoint {
        let loc = self.index.locate(distance_m);
        let a = &self.points[loc.segment];
        match self.points.get(loc.segment + 1) {
            Some(b) => a.lerp(b, loc.t),
            None => *a,
        }
    }

    fn slope_at(&self, distance_m: f64, here: &GeoPoint) -> f64 {
        let total = self.index.total();
        let ahead_m = (distance_m + self.tuning.slope_lookahead_m).min(total);
        let run = ahead_m - distance_m;
        if run < MIN_PROBE_RUN_M {
            return 0.0;
        }
        let rise = self.terrain.height_at(&self.position_at(ahead_m)) - self.terrain.height_at(here);
        rise.atan2(run).to_degrees()
    }

    fn lookahead_bearing(&self, distance_m: f64, here: &GeoPoint) -> Option<f64> {
        let total = self.index.total();
        let ahead_m = (distance_m + self.tuning.bearing_lookahead_m).min(total);
        if ahead_m - distance_m < MIN_PROBE_RUN_M {
            return None;
        }
        Some(bearing_deg(here, &self.position_at(ahead_m)))
    }

    fn camera_height_target(&self, camera_at: &GeoPoint, bonus_m: f64) -> f64 {
        let ground = self.terrain.height_at(camera_at);
        (ground + self.tuning.base_height_agl_m + bonus_m).max(self.tuning.min_height_m + bonus_m)
    }
}

/// Classify a slope and derive the adaptive offsets it calls for.
pub fn adaptive_targets(slope_deg: f64, tuning: &FlightTuning) -> (SlopeKind, AdaptiveOffsets) {
    let kind = if slope_deg > tuning.slope_threshold_deg {
        SlopeKind::Climbing
    } else if slope_deg < -tuning.slope_threshold_deg {
        SlopeKind::Descending
    } else {
        SlopeKind::Flat
    };
    let intensity = slope_deg.abs().clamp(0.0, tuning.max_slope_intensity_deg.max(0.0));
    let offsets = match kind {
        SlopeKind::Climbing => AdaptiveOffsets {
            height_bonus_m: intensity * tuning.climb_height_per_deg,
            setback_bonus_m: intensity * tuning.climb_setback_per_deg,
            pitch_offset_deg: intensity * tuning.climb_pitch_per_deg,
        },
        SlopeKind::Descending => AdaptiveOffsets {
            height_bonus_m: intensity * tuning.descent_height_per_deg,
            setback_bonus_m: intensity
                * tuning.climb_setback_per_deg
                * tuning.descent_setback_ratio,
            pitch_offset_deg: -intensity * tuning.descent_pitch_per_deg,
        },
        SlopeKind::Flat => AdaptiveOffsets::default(),
    };
    (kind, offsets)
}

/// Advance the flight to `now`.
///
/// Ticks are expected in non-decreasing `now` order. Waypoint proximity is
/// checked before the end of the path so a pause at the final stop still
/// plays out before the flight finishes.
pub fn advance(state: &mut FlightState, now: Duration, ctx: &FlightContext<'_>) -> Tick {
    match state.mode {
        FlyingMode::Paused => return Tick::Paused,
        FlyingMode::WaypointPaused => {
            if state.pause_until.is_some_and(|until| until > now) {
                return Tick::Holding;
            }
            state.mode = FlyingMode::Running;
            state.pause_until = None;
            state.last_tick = None;
        }
        FlyingMode::Running => {}
    }

    let total = ctx.index.total();
    let elapsed_s = state
        .last_tick
        .map(|prev| now.saturating_sub(prev).as_secs_f64())
        .unwrap_or(0.0);
    state.last_tick = Some(now);

    let previous_m = state.current_distance_m;
    state.current_distance_m +=
        elapsed_s * ctx.tuning.base_speed_mps * f64::from(state.speed_multiplier);

    if let Some(marker) = reach_waypoint(state, previous_m, now, ctx) {
        return Tick::WaypointReached(marker);
    }

    if state.current_distance_m >= total {
        state.current_distance_m = total;
        state.location = ctx.index.locate(total);
        return Tick::Finished;
    }

    Tick::Frame(compose_frame(state, ctx))
}

fn reach_waypoint(
    state: &mut FlightState,
    previous_m: f64,
    now: Duration,
    ctx: &FlightContext<'_>,
) -> Option<WaypointMarker> {
    let current = state.current_distance_m;
    let proximity = ctx.tuning.waypoint_proximity_m;
    let (index, marker) = ctx.waypoints.iter().enumerate().find(|(i, wp)| {
        if state.visited.contains(i) {
            return false;
        }
        let near = (current - wp.distance_m).abs() < proximity;
        // a fast tick can jump clean over the proximity band
        let crossed = previous_m < wp.distance_m && current >= wp.distance_m;
        near || crossed
    })?;

    state.visited.insert(index);
    if current > marker.distance_m {
        state.current_distance_m = marker.distance_m;
    }
    state.location = ctx.index.locate(state.current_distance_m);
    state.mode = FlyingMode::WaypointPaused;
    state.pause_until = Some(now + Duration::from_millis(ctx.tuning.waypoint_pause_ms));
    Some(marker.clone())
}

fn compose_frame(state: &mut FlightState, ctx: &FlightContext<'_>) -> FlightFrame {
    let tuning = ctx.tuning;
    let distance_m = state.current_distance_m;
    state.location = ctx.index.locate(distance_m);
    let hiker = ctx.position_at(distance_m);

    let slope_deg = ctx.slope_at(distance_m, &hiker);
    let (slope, target) = adaptive_targets(slope_deg, tuning);
    state.adaptive.approach(&target, tuning.adaptive_smoothing);

    if let Some(target_bearing) = ctx.lookahead_bearing(distance_m, &hiker) {
        state.bearing_deg = lerp_bearing(state.bearing_deg, target_bearing, tuning.bearing_smoothing);
    }

    let setback_m = tuning.base_setback_m + state.adaptive.setback_bonus_m;
    let camera_at = offset_by_bearing(&hiker, setback_m, state.bearing_deg + 180.0);
    let height_target = ctx.camera_height_target(&camera_at, state.adaptive.height_bonus_m);
    let height_m = match state.camera_height_m {
        Some(height) => height + (height_target - height) * tuning.height_smoothing,
        None => height_target,
    };
    state.camera_height_m = Some(height_m);

    let pitch_deg = (tuning.base_pitch_deg + state.adaptive.pitch_offset_deg).clamp(-89.0, 0.0);
    let total = ctx.index.total();

    FlightFrame {
        camera: CameraPose::looking(camera_at, height_m, state.bearing_deg, pitch_deg),
        hiker,
        distance_km: distance_m / 1000.0,
        percent: if total > 0.0 {
            distance_m / total * 100.0
        } else {
            0.0
        },
        slope_deg,
        slope,
    }
}

/// A flight over one route, from start to stop.
#[derive(Debug, Clone)]
pub struct FlightSession {
    points: Vec<GeoPoint>,
    index: DistanceIndex,
    waypoints: Vec<WaypointMarker>,
    terrain: TerrainHeightCache,
    tuning: FlightTuning,
    state: FlightState,
}

impl FlightSession {
    /// Set up a session positioned at the start of the path, paused.
    ///
    /// Waypoints at the very start are marked visited: their name is shown
    /// as the session opens rather than as a pause.
    pub fn new(
        points: Vec<GeoPoint>,
        waypoints: Vec<WaypointMarker>,
        terrain: TerrainHeightCache,
        tuning: FlightTuning,
        speed_multiplier: u32,
    ) -> Result<Self, FlightError> {
        if points.len() < 2 {
            return Err(FlightError::DegeneratePath {
                points: points.len(),
            });
        }
        let index = DistanceIndex::build(&points);
        if index.total() <= 0.0 {
            return Err(FlightError::ZeroLength);
        }

        let mut session = Self {
            points,
            index,
            waypoints,
            terrain,
            tuning,
            state: FlightState::new(0.0, speed_multiplier),
        };
        let start = session.points[0];
        let initial_bearing = session.context().lookahead_bearing(0.0, &start).unwrap_or(0.0);
        session.state.bearing_deg = initial_bearing;
        for (i, wp) in session.waypoints.iter().enumerate() {
            if wp.distance_m <= 0.0 {
                session.state.visited.insert(i);
            }
        }
        Ok(session)
    }

    fn context(&self) -> FlightContext<'_> {
        FlightContext {
            points: &self.points,
            index: &self.index,
            waypoints: &self.waypoints,
            terrain: &self.terrain,
            tuning: &self.tuning,
        }
    }

    pub fn state(&self) -> &FlightState {
        &self.state
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn waypoints(&self) -> &[WaypointMarker] {
        &self.waypoints
    }

    pub fn total_distance_m(&self) -> f64 {
        self.index.total()
    }

    pub fn mode(&self) -> FlyingMode {
        self.state.mode
    }

    /// The waypoint announced when the session opens.
    pub fn first_waypoint(&self) -> Option<&WaypointMarker> {
        self.waypoints.first()
    }

    /// Camera pose at the path start, facing along the route.
    ///
    /// Also seeds the smoothed camera height so the first frame does not jump.
    pub fn opening_pose(&mut self) -> CameraPose {
        let start = self.points[0];
        let ctx = self.context();
        let camera_at = offset_by_bearing(
            &start,
            self.tuning.base_setback_m,
            self.state.bearing_deg + 180.0,
        );
        let height_m = ctx.camera_height_target(&camera_at, 0.0);
        let pitch_deg = self.tuning.base_pitch_deg;
        self.state.camera_height_m = Some(height_m);
        CameraPose::looking(camera_at, height_m, self.state.bearing_deg, pitch_deg)
    }

    /// Current interpolated ground position of the hiker.
    pub fn hiker_position(&self) -> GeoPoint {
        self.context().position_at(self.state.current_distance_m)
    }

    pub fn tick(&mut self, now: Duration) -> Tick {
        let ctx = FlightContext {
            points: &self.points,
            index: &self.index,
            waypoints: &self.waypoints,
            terrain: &self.terrain,
            tuning: &self.tuning,
        };
        advance(&mut self.state, now, &ctx)
    }

    /// Pause a running flight or resume a paused one.
    pub fn toggle_pause(&mut self) -> FlyingMode {
        self.state.mode = match self.state.mode {
            FlyingMode::Running | FlyingMode::WaypointPaused => {
                self.state.pause_until = None;
                FlyingMode::Paused
            }
            FlyingMode::Paused => {
                self.state.last_tick = None;
                FlyingMode::Running
            }
        };
        self.state.mode
    }

    /// Jump to a distance along the route (km) and keep flying from there.
    ///
    /// Every waypoint at or before the target joins the visited set. Visits
    /// are never forgotten, so seeking back does not replay earlier pauses.
    pub fn seek_km(&mut self, target_km: f64) {
        if !target_km.is_finite() {
            return;
        }
        let target_m = (target_km * 1000.0).clamp(0.0, self.index.total());
        self.state.current_distance_m = target_m;
        self.state.location = self.index.locate(target_m);
        self.state.last_tick = None;
        self.state.pause_until = None;
        for (i, wp) in self.waypoints.iter().enumerate() {
            if wp.distance_m <= target_m {
                self.state.visited.insert(i);
            }
        }
        self.state.mode = FlyingMode::Running;
    }

    /// Swap in the terrain gathered for this route.
    pub fn replace_terrain(&mut self, terrain: TerrainHeightCache) {
        self.terrain = terrain;
    }

    pub fn terrain(&self) -> &TerrainHeightCache {
        &self.terrain
    }

    pub fn set_speed_multiplier(&mut self, multiplier: u32) {
        self.state.speed_multiplier = multiplier.max(1);
    }
}
