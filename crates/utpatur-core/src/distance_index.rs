//! Cumulative-distance lookup over a decoded path.

use crate::models::GeoPoint;
use crate::spatial::distance_between;

/// Where a distance along the path falls: the segment start index and the
/// fraction travelled along that segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLocation {
    pub segment: usize,
    pub t: f64,
}

impl PathLocation {
    pub const START: Self = Self { segment: 0, t: 0.0 };
}

/// Cumulative great-circle distances aligned 1:1 with a path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceIndex {
    distances: Vec<f64>,
}

impl DistanceIndex {
    /// Build the index in one pass. Non-finite legs count as zero length.
    pub fn build(points: &[GeoPoint]) -> Self {
        let mut distances = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                let leg = distance_between(&points[i - 1], point);
                if leg.is_finite() && leg > 0.0 {
                    total += leg;
                }
            }
            distances.push(total);
        }
        Self { distances }
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn total(&self) -> f64 {
        self.distances.last().copied().unwrap_or(0.0)
    }

    /// Cumulative distance at a point index, clamped to the last point.
    pub fn distance_at(&self, index: usize) -> f64 {
        match self.distances.len() {
            0 => 0.0,
            len => self.distances[index.min(len - 1)],
        }
    }

    /// Locate a distance along the path.
    ///
    /// The target is clamped to `[0, total]`. Returns the last index whose
    /// cumulative distance does not exceed the target, never past the final
    /// segment, so the total distance maps to the last segment with `t = 1`.
    pub fn locate(&self, target_m: f64) -> PathLocation {
        let total = self.total();
        if self.distances.len() < 2 || total <= 0.0 || !target_m.is_finite() {
            return PathLocation::START;
        }
        let last_segment = self.distances.len() - 2;
        let target = target_m.clamp(0.0, total);
        if target <= 0.0 {
            return PathLocation::START;
        }
        if target >= total {
            return PathLocation {
                segment: last_segment,
                t: 1.0,
            };
        }

        let after = self.distances.partition_point(|d| *d <= target);
        let segment = after.saturating_sub(1).min(last_segment);
        let start = self.distances[segment];
        let span = self.distances[segment + 1] - start;
        let t = if span > 0.0 {
            ((target - start) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        PathLocation { segment, t }
    }

    /// Interpolated ground position at a distance along `points`.
    pub fn position_at(&self, points: &[GeoPoint], target_m: f64) -> Option<GeoPoint> {
        let first = points.first()?;
        if points.len() < 2 || points.len() != self.distances.len() {
            return Some(*first);
        }
        let loc = self.locate(target_m);
        let a = &points[loc.segment];
        let b = &points[loc.segment + 1];
        Some(a.lerp(b, loc.t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::offset_by_bearing;

    fn straight_path(legs_m: &[f64]) -> Vec<GeoPoint> {
        let mut points = vec![GeoPoint::new(68.0, 18.5)];
        for leg in legs_m {
            let last = points[points.len() - 1];
            points.push(offset_by_bearing(&last, *leg, 0.0));
        }
        points
    }

    #[test]
    fn cumulative_distances_are_monotonic_and_start_at_zero() {
        let points = straight_path(&[1_000.0, 0.0, 2_500.0, 40.0]);
        let index = DistanceIndex::build(&points);
        assert_eq!(index.len(), points.len());
        assert_eq!(index.distances()[0], 0.0);
        for pair in index.distances().windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!((index.total() - 3_540.0).abs() < 1.0);
        assert_eq!(index.distance_at(99), index.total());
    }

    #[test]
    fn locate_endpoints() {
        let index = DistanceIndex::build(&straight_path(&[1_000.0, 1_000.0, 1_000.0]));
        assert_eq!(index.locate(0.0), PathLocation::START);
        assert_eq!(index.locate(-50.0), PathLocation::START);

        let end = index.locate(index.total());
        assert_eq!(end.segment, 2);
        assert_eq!(end.t, 1.0);
        assert_eq!(index.locate(index.total() + 10.0), end);
    }

    #[test]
    fn locate_is_linear_within_a_segment() {
        let index = DistanceIndex::build(&straight_path(&[1_000.0, 2_000.0]));
        let d1 = index.distances()[1];
        let d2 = index.distances()[2];
        for fraction in [0.0, 0.1, 0.5, 0.9] {
            let target = d1 + (d2 - d1) * fraction;
            let loc = index.locate(target);
            assert_eq!(loc.segment, 1, "fraction {fraction}");
            assert!((loc.t - fraction).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_length_segments_yield_zero_fraction() {
        let index = DistanceIndex::build(&straight_path(&[500.0, 0.0, 500.0]));
        let loc = index.locate(index.distances()[1]);
        assert_eq!(loc.segment, 2);
        assert_eq!(loc.t, 0.0);
    }

    #[test]
    fn degenerate_paths_locate_to_start() {
        let single = DistanceIndex::build(&[GeoPoint::new(68.0, 18.0)]);
        assert_eq!(single.total(), 0.0);
        assert_eq!(single.locate(100.0), PathLocation::START);

        let same = GeoPoint::new(68.0, 18.0);
        let stacked = DistanceIndex::build(&[same, same, same]);
        assert_eq!(stacked.total(), 0.0);
        assert_eq!(stacked.locate(0.0), PathLocation::START);

        let empty = DistanceIndex::build(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.distance_at(3), 0.0);
    }

    #[test]
    fn position_at_interpolates_between_points() {
        let points = straight_path(&[2_000.0]);
        let index = DistanceIndex::build(&points);
        let mid = index.position_at(&points, index.total() / 2.0);
        let Some(mid) = mid else {
            panic!("expected a position");
        };
        assert!((mid.lat - (points[0].lat + points[1].lat) / 2.0).abs() < 1e-9);
    }
}
