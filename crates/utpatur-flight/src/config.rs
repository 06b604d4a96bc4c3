//! Runtime configuration from environment.

use std::env;
use std::time::Duration;

pub const DEFAULT_TERRAIN_URL: &str = "https://api.open-meteo.com/v1/elevation";

#[derive(Debug, Clone)]
pub struct Config {
    /// Elevation endpoint; empty disables terrain sampling
    pub terrain_provider_url: String,
    pub terrain_request_timeout_s: u64,
    pub terrain_cache_ttl_s: u64,
    pub terrain_max_points_per_request: usize,
    /// Frames per second of the flight loop
    pub frame_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terrain_provider_url: DEFAULT_TERRAIN_URL.to_string(),
            terrain_request_timeout_s: 10,
            terrain_cache_ttl_s: 3_600,
            terrain_max_points_per_request: 100,
            frame_rate: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            terrain_provider_url: env::var("UTPATUR_TERRAIN_URL")
                .unwrap_or(defaults.terrain_provider_url),
            terrain_request_timeout_s: env::var("UTPATUR_TERRAIN_TIMEOUT_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.terrain_request_timeout_s),
            terrain_cache_ttl_s: env::var("UTPATUR_TERRAIN_CACHE_TTL_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.terrain_cache_ttl_s),
            terrain_max_points_per_request: env::var("UTPATUR_TERRAIN_MAX_POINTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.terrain_max_points_per_request),
            frame_rate: env::var("UTPATUR_FRAME_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|fps: &u32| *fps > 0)
                .unwrap_or(defaults.frame_rate),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.clamp(1, 240)))
    }

    pub fn terrain_enabled(&self) -> bool {
        !self.terrain_provider_url.trim().is_empty()
    }
}
