//! Terrain height providers.
//!
//! [`OpenMeteoProvider`] fetches heights from an Open-Meteo compatible
//! elevation endpoint, memoising per-coordinate results in a process-wide
//! TTL cache. [`NoTerrain`] is the offline stand-in that never answers.

use crate::backoff::Backoff;
use crate::cache::{prune_cache, CacheEntry};
use crate::config::Config;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use utpatur_core::GeoPoint;

const MAX_CACHE_ENTRIES: usize = 50_000;
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("terrain request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("terrain provider HTTP {0}")]
    Status(StatusCode),
    #[error("terrain provider response missing elevation")]
    MissingElevation,
    #[error("terrain provider returned {got} heights for {expected} points")]
    SampleCount { expected: usize, got: usize },
    #[error("terrain provider backing off for another {0:?}")]
    BackingOff(Duration),
    #[error("terrain provider unavailable")]
    Unavailable,
}

/// Source of ground heights for a batch of coordinates.
///
/// Implementations return one height (m) per input point, in order.
pub trait TerrainProvider: Send + Sync {
    fn sample_heights(
        &self,
        points: &[GeoPoint],
    ) -> impl Future<Output = Result<Vec<f64>, TerrainError>> + Send;
}

/// Provider used when no terrain service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTerrain;

impl TerrainProvider for NoTerrain {
    async fn sample_heights(&self, _points: &[GeoPoint]) -> Result<Vec<f64>, TerrainError> {
        Err(TerrainError::Unavailable)
    }
}

#[derive(Debug, Clone, Copy)]
struct HeightEntry {
    fetched_at: Instant,
    height_m: f64,
}

impl CacheEntry for HeightEntry {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

type HeightKey = (i64, i64);

fn height_cache() -> &'static DashMap<HeightKey, HeightEntry> {
    static CACHE: OnceLock<DashMap<HeightKey, HeightEntry>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Cache key: coordinates rounded to 4 decimals (~10 m).
fn height_key(point: &GeoPoint) -> HeightKey {
    (
        (point.lat * 1e4).round() as i64,
        (point.lon * 1e4).round() as i64,
    )
}

#[derive(Debug, Deserialize)]
struct OpenMeteoElevationResponse {
    elevation: Option<Vec<f64>>,
}

#[derive(Debug)]
pub struct OpenMeteoProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
    cache_ttl: Duration,
    max_points: usize,
    backoff: Mutex<Backoff>,
}

impl OpenMeteoProvider {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.terrain_provider_url.trim().to_string(),
            timeout: Duration::from_secs(config.terrain_request_timeout_s.max(1)),
            cache_ttl: Duration::from_secs(config.terrain_cache_ttl_s.max(30)),
            max_points: config.terrain_max_points_per_request.max(1),
            backoff: Mutex::new(Backoff::new(BACKOFF_BASE, BACKOFF_MAX)),
        }
    }

    fn retry_in(&self) -> Option<Duration> {
        self.backoff.lock().ok()?.retry_in()
    }

    fn note_failure(&self) -> Option<Duration> {
        self.backoff.lock().ok().map(|mut backoff| backoff.record_failure())
    }

    fn note_success(&self) {
        if let Ok(mut backoff) = self.backoff.lock() {
            backoff.record_success();
        }
    }

    async fn fetch_chunk(&self, points: &[GeoPoint]) -> Result<Vec<f64>, TerrainError> {
        let latitudes: Vec<f64> = points.iter().map(|p| p.lat).collect();
        let longitudes: Vec<f64> = points.iter().map(|p| p.lon).collect();
        let url = build_provider_url(
            &self.base_url,
            &join_params(&latitudes),
            &join_params(&longitudes),
        );

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TerrainError::Status(response.status()));
        }
        let payload: OpenMeteoElevationResponse = response.json().await?;
        let heights = payload.elevation.ok_or(TerrainError::MissingElevation)?;
        if heights.len() != points.len() {
            return Err(TerrainError::SampleCount {
                expected: points.len(),
                got: heights.len(),
            });
        }
        Ok(heights
            .into_iter()
            .map(|h| if h.is_finite() { h } else { 0.0 })
            .collect())
    }
}

impl TerrainProvider for OpenMeteoProvider {
    async fn sample_heights(&self, points: &[GeoPoint]) -> Result<Vec<f64>, TerrainError> {
        if self.base_url.is_empty() {
            return Err(TerrainError::Unavailable);
        }

        let cache = height_cache();
        let mut heights: Vec<Option<f64>> = vec![None; points.len()];
        let mut stale: Vec<Option<f64>> = vec![None; points.len()];
        let mut missing: Vec<usize> = Vec::new();
        for (idx, point) in points.iter().enumerate() {
            match cache.get(&height_key(point)) {
                Some(entry) if entry.fetched_at.elapsed() <= self.cache_ttl => {
                    heights[idx] = Some(entry.height_m);
                }
                Some(entry) if entry.fetched_at.elapsed() <= self.cache_ttl.saturating_mul(2) => {
                    stale[idx] = Some(entry.height_m);
                    missing.push(idx);
                }
                _ => missing.push(idx),
            }
        }

        if !missing.is_empty() {
            if let Some(remaining) = self.retry_in() {
                return stale_or(&missing, &mut heights, &stale, TerrainError::BackingOff(remaining));
            }

            for chunk in missing.chunks(self.max_points) {
                let chunk_points: Vec<GeoPoint> = chunk.iter().map(|&idx| points[idx]).collect();
                match self.fetch_chunk(&chunk_points).await {
                    Ok(fetched) => {
                        let fetched_at = Instant::now();
                        for (&idx, height_m) in chunk.iter().zip(fetched) {
                            heights[idx] = Some(height_m);
                            cache.insert(
                                height_key(&points[idx]),
                                HeightEntry {
                                    fetched_at,
                                    height_m,
                                },
                            );
                        }
                        self.note_success();
                    }
                    Err(err) => {
                        let delay = self.note_failure();
                        tracing::warn!(
                            "Terrain fetch failed ({} points), backing off {:?}: {}",
                            chunk.len(),
                            delay,
                            err
                        );
                        return stale_or(&missing, &mut heights, &stale, err);
                    }
                }
            }
            prune_cache(cache, MAX_CACHE_ENTRIES, self.cache_ttl.saturating_mul(2));
        }

        Ok(heights.into_iter().map(|h| h.unwrap_or(0.0)).collect())
    }
}

/// Fill still-missing heights from stale entries, or fail with `err`.
fn stale_or(
    missing: &[usize],
    heights: &mut [Option<f64>],
    stale: &[Option<f64>],
    err: TerrainError,
) -> Result<Vec<f64>, TerrainError> {
    for &idx in missing {
        if heights[idx].is_none() {
            match stale[idx] {
                Some(height_m) => heights[idx] = Some(height_m),
                None => return Err(err),
            }
        }
    }
    tracing::warn!("Terrain provider failed, using stale cache: {}", err);
    Ok(heights.iter().map(|h| h.unwrap_or(0.0)).collect())
}

fn join_params(values: &[f64]) -> String {
    let mut buf = String::new();
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            buf.push(',');
        }
        buf.push_str(&format!("{:.5}", value));
    }
    buf
}

fn build_provider_url(base: &str, latitudes: &str, longitudes: &str) -> String {
    let separator = if base.contains('?') { "&" } else { "?" };
    format!("{base}{separator}latitude={latitudes}&longitude={longitudes}")
}
