//! Approximate ground-height lookup built from sampled terrain heights.
//!
//! Samples live in an R-tree keyed by (lon, lat); a lookup returns the
//! height of the nearest cached sample however far away it is.

use crate::models::GeoPoint;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeightSample {
    lon: f64,
    lat: f64,
    height_m: f64,
}

impl RTreeObject for HeightSample {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lon, self.lat])
    }
}

impl PointDistance for HeightSample {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlon = self.lon - point[0];
        let dlat = self.lat - point[1];
        dlon * dlon + dlat * dlat
    }
}

/// Append-only nearest-neighbor height cache.
#[derive(Debug, Clone, Default)]
pub struct TerrainHeightCache {
    samples: RTree<HeightSample>,
}

impl TerrainHeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.size()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.size() == 0
    }

    /// Record a sampled height. Non-finite input is ignored.
    pub fn insert(&mut self, point: GeoPoint, height_m: f64) {
        if !point.is_finite() || !height_m.is_finite() {
            return;
        }
        self.samples.insert(HeightSample {
            lon: point.lon,
            lat: point.lat,
            height_m,
        });
    }

    /// Height of the nearest cached sample, or 0 when nothing is cached.
    pub fn height_at(&self, point: &GeoPoint) -> f64 {
        if !point.is_finite() {
            return 0.0;
        }
        self.samples
            .nearest_neighbor(&[point.lon, point.lat])
            .map(|sample| sample.height_m)
            .unwrap_or(0.0)
    }
}

/// Indices of up to `target` evenly spaced points, always including both ends.
pub fn evenly_spaced_indices(len: usize, target: usize) -> Vec<usize> {
    if len == 0 || target == 0 {
        return Vec::new();
    }
    if len <= target {
        return (0..len).collect();
    }
    if target == 1 {
        return vec![0];
    }
    let step = (len - 1) as f64 / (target - 1) as f64;
    let mut indices: Vec<usize> = (0..target)
        .map(|i| ((i as f64 * step).round() as usize).min(len - 1))
        .collect();
    indices.dedup();
    indices
}
