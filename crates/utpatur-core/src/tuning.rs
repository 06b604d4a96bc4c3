//! Tunable constants for the camera flight and terrain preparation.

use serde::{Deserialize, Serialize};

/// Camera flight tuning.
///
/// The defaults are empirically tuned; only the ratios between them matter
/// (descents pull the camera back further than climbs, height tracks terrain
/// faster than the slope-adaptive offsets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightTuning {
    /// Ground speed of the virtual hiker before the speed multiplier (m/s)
    pub base_speed_mps: f64,
    /// Discrete speed multipliers cycled by the speed control
    pub speed_steps: Vec<u32>,
    /// Distance at which a waypoint counts as reached (m)
    pub waypoint_proximity_m: f64,
    /// How long the flight holds at a reached waypoint (ms)
    pub waypoint_pause_ms: u64,
    /// Look-ahead used to estimate the local slope (m)
    pub slope_lookahead_m: f64,
    /// Slopes steeper than this are climbs or descents (deg)
    pub slope_threshold_deg: f64,
    /// Slope magnitude at which adaptive offsets saturate (deg)
    pub max_slope_intensity_deg: f64,
    /// Extra height per degree of climb (m/deg)
    pub climb_height_per_deg: f64,
    /// Extra setback per degree of climb (m/deg)
    pub climb_setback_per_deg: f64,
    /// Pitch raise per degree of climb (deg/deg)
    pub climb_pitch_per_deg: f64,
    /// Extra height per degree of descent (m/deg)
    pub descent_height_per_deg: f64,
    /// Descent setback bonus relative to the climb setback bonus
    pub descent_setback_ratio: f64,
    /// Pitch drop per degree of descent (deg/deg)
    pub descent_pitch_per_deg: f64,
    /// Per-tick smoothing of the slope-adaptive offsets
    pub adaptive_smoothing: f64,
    /// Look-ahead used to derive the camera heading (m)
    pub bearing_lookahead_m: f64,
    /// Per-tick smoothing of the camera heading
    pub bearing_smoothing: f64,
    /// Per-tick smoothing of the camera height
    pub height_smoothing: f64,
    /// Camera height above the ground under the camera (m)
    pub base_height_agl_m: f64,
    /// Floor for the camera height regardless of terrain (m)
    pub min_height_m: f64,
    /// Horizontal distance behind the hiker (m)
    pub base_setback_m: f64,
    /// Camera pitch on flat ground (deg, negative looks down)
    pub base_pitch_deg: f64,
}

impl Default for FlightTuning {
    fn default() -> Self {
        Self {
            base_speed_mps: 160.0,
            speed_steps: vec![1, 2, 5, 10],
            waypoint_proximity_m: 50.0,
            waypoint_pause_ms: 2_000,
            slope_lookahead_m: 150.0,
            slope_threshold_deg: 5.0,
            max_slope_intensity_deg: 15.0,
            climb_height_per_deg: 20.0,
            climb_setback_per_deg: 30.0,
            climb_pitch_per_deg: 0.6,
            descent_height_per_deg: 25.0,
            descent_setback_ratio: 3.5,
            descent_pitch_per_deg: 0.8,
            adaptive_smoothing: 0.015,
            bearing_lookahead_m: 500.0,
            bearing_smoothing: 0.025,
            height_smoothing: 0.15,
            base_height_agl_m: 350.0,
            min_height_m: 600.0,
            base_setback_m: 1_200.0,
            base_pitch_deg: -25.0,
        }
    }
}

/// Terrain pre-sampling and warm-up tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainTuning {
    /// Number of evenly spaced path points to sample
    pub sample_target: usize,
    /// Points per provider request
    pub batch_size: usize,
    /// Low-altitude viewport placements during warm-up
    pub warmup_placements: usize,
    /// Pause after each warm-up placement (ms)
    pub warmup_delay_ms: u64,
    /// Warm-up camera height above the sampled ground (m)
    pub warmup_height_agl_m: f64,
    /// Share of reported progress attributed to sampling (percent)
    pub sampling_share_pct: u8,
}

impl Default for TerrainTuning {
    fn default() -> Self {
        Self {
            sample_target: 50,
            batch_size: 10,
            warmup_placements: 10,
            warmup_delay_ms: 150,
            warmup_height_agl_m: 300.0,
            sampling_share_pct: 20,
        }
    }
}

/// Selected speed multiplier, as a position in the tuning's step list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeedSelector {
    step: usize,
}

impl SpeedSelector {
    pub fn multiplier(&self, tuning: &FlightTuning) -> u32 {
        tuning
            .speed_steps
            .get(self.step)
            .copied()
            .unwrap_or(1)
    }

    /// Advance to the next step, wrapping back to the first.
    pub fn cycle(&mut self, tuning: &FlightTuning) -> u32 {
        let steps = tuning.speed_steps.len().max(1);
        self.step = (self.step + 1) % steps;
        self.multiplier(tuning)
    }
}
