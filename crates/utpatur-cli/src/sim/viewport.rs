//! A viewport with no screen: every call is logged and tallied.

use utpatur_core::{CameraPose, GeoPoint};
use utpatur_flight::{Viewport, ViewportError};

/// What a headless flight asked of its viewport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportRecord {
    pub camera_sets: usize,
    pub fly_tos: usize,
    pub renders: usize,
    pub hiker_moves: usize,
    pub lowest_camera_m: Option<f64>,
    pub highest_camera_m: Option<f64>,
}

/// Logs camera and marker updates through `tracing`.
///
/// Camera sets are logged at trace level every `log_every` calls so a
/// 60 fps flight doesn't flood the output.
#[derive(Debug, Clone)]
pub struct LoggingViewport {
    pose: Option<CameraPose>,
    hiker: Option<GeoPoint>,
    record: ViewportRecord,
    log_every: usize,
}

impl LoggingViewport {
    pub fn new(log_every: usize) -> Self {
        Self {
            pose: None,
            hiker: None,
            record: ViewportRecord::default(),
            log_every: log_every.max(1),
        }
    }

    pub fn record(&self) -> &ViewportRecord {
        &self.record
    }

    pub fn hiker(&self) -> Option<GeoPoint> {
        self.hiker
    }
}

impl Default for LoggingViewport {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Viewport for LoggingViewport {
    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), ViewportError> {
        if !pose.position.is_finite() || !pose.height_m.is_finite() {
            return Err(ViewportError::new(format!(
                "non-finite camera pose at {:.5},{:.5} h={}",
                pose.position.lat, pose.position.lon, pose.height_m
            )));
        }
        self.record.camera_sets += 1;
        self.record.lowest_camera_m = Some(
            self.record
                .lowest_camera_m
                .map_or(pose.height_m, |h| h.min(pose.height_m)),
        );
        self.record.highest_camera_m = Some(
            self.record
                .highest_camera_m
                .map_or(pose.height_m, |h| h.max(pose.height_m)),
        );
        if self.record.camera_sets % self.log_every == 0 {
            tracing::trace!(
                "Camera {:.5},{:.5} h={:.0}m heading={:.1} pitch={:.1}",
                pose.position.lat,
                pose.position.lon,
                pose.height_m,
                pose.heading_deg,
                pose.pitch_deg
            );
        }
        self.pose = Some(*pose);
        Ok(())
    }

    fn fly_to(&mut self, pose: &CameraPose) -> Result<(), ViewportError> {
        self.record.fly_tos += 1;
        tracing::debug!(
            "Camera flying to {:.4},{:.4} h={:.0}m",
            pose.position.lat,
            pose.position.lon,
            pose.height_m
        );
        self.pose = Some(*pose);
        Ok(())
    }

    fn request_render(&mut self) -> Result<(), ViewportError> {
        self.record.renders += 1;
        Ok(())
    }

    fn place_hiker(&mut self, at: &GeoPoint) -> Result<(), ViewportError> {
        if self.hiker.is_none() {
            tracing::debug!("Hiker placed at {:.5},{:.5}", at.lat, at.lon);
        }
        self.record.hiker_moves += 1;
        self.hiker = Some(*at);
        Ok(())
    }

    fn remove_hiker(&mut self) -> Result<(), ViewportError> {
        if self.hiker.take().is_some() {
            tracing::debug!("Hiker removed");
        }
        Ok(())
    }

    fn current_pose(&self) -> Option<CameraPose> {
        self.pose
    }
}
