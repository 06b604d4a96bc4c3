//! Terrain preparation before a flight: sample heights along the path,
//! then warm the viewport's own terrain tiles with brief low passes.

use crate::provider::TerrainProvider;
use crate::viewport::{Viewport, ViewportError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use utpatur_core::{evenly_spaced_indices, CameraPose, GeoPoint, TerrainHeightCache, TerrainTuning};

const WARMUP_PITCH_DEG: f64 = -45.0;

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("terrain preparation cancelled")]
    Cancelled,
    #[error(transparent)]
    Viewport(#[from] ViewportError),
}

/// Receiving side of a stop request.
///
/// Every bump of the shared counter after [`CancelSignal::arm`] cancels.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<u64>,
}

impl CancelSignal {
    pub fn new(rx: watch::Receiver<u64>) -> Self {
        Self { rx }
    }

    /// Forget stop requests issued so far.
    pub fn arm(&mut self) {
        self.rx.borrow_and_update();
    }

    /// Resolves once a stop is requested; never resolves if the sender is gone.
    pub async fn cancelled(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Build the height cache for `points` and warm up the viewport.
///
/// Provider failures are logged and skipped; the cache keeps whatever was
/// gathered. `progress` receives percentages and always ends at 100 unless
/// preparation is cancelled or the viewport fails.
pub async fn prepare_terrain<P, V>(
    points: &[GeoPoint],
    provider: &P,
    viewport: &mut V,
    tuning: &TerrainTuning,
    cancel: &mut CancelSignal,
    mut progress: impl FnMut(u8),
) -> Result<TerrainHeightCache, PrepareError>
where
    P: TerrainProvider,
    V: Viewport,
{
    let mut cache = TerrainHeightCache::new();
    let sampling_share = f64::from(tuning.sampling_share_pct.min(100));
    progress(0);

    let sample_indices = evenly_spaced_indices(points.len(), tuning.sample_target);
    let batches: Vec<&[usize]> = sample_indices.chunks(tuning.batch_size.max(1)).collect();
    for (n, batch) in batches.iter().enumerate() {
        let batch_points: Vec<GeoPoint> = batch.iter().map(|&i| points[i]).collect();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PrepareError::Cancelled),
            result = provider.sample_heights(&batch_points) => result,
        };
        match result {
            Ok(heights) if heights.len() == batch_points.len() => {
                for (point, height_m) in batch_points.iter().zip(heights) {
                    cache.insert(*point, height_m);
                }
            }
            Ok(heights) => {
                tracing::warn!(
                    "Terrain batch {} returned {} heights for {} points, skipping",
                    n,
                    heights.len(),
                    batch_points.len()
                );
            }
            Err(err) => {
                tracing::warn!("Terrain batch {} failed: {}", n, err);
            }
        }
        progress(scaled(sampling_share, n + 1, batches.len()));
    }
    tracing::debug!("Terrain sampled: {} heights cached", cache.len());

    let placements = evenly_spaced_indices(points.len(), tuning.warmup_placements);
    let delay = Duration::from_millis(tuning.warmup_delay_ms);
    for (n, &idx) in placements.iter().enumerate() {
        let at = points[idx];
        let height_m = cache.height_at(&at) + tuning.warmup_height_agl_m;
        viewport.set_camera(&CameraPose::looking(at, height_m, 0.0, WARMUP_PITCH_DEG))?;
        viewport.request_render()?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PrepareError::Cancelled),
            _ = sleep(delay) => {}
        }
        let done = scaled(100.0 - sampling_share, n + 1, placements.len());
        progress((sampling_share as u8).saturating_add(done).min(100));
    }

    progress(100);
    Ok(cache)
}

fn scaled(share: f64, done: usize, total: usize) -> u8 {
    if total == 0 {
        return share.round() as u8;
    }
    (share * done as f64 / total as f64).round().clamp(0.0, 100.0) as u8
}
