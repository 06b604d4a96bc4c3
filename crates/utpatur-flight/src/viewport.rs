//! The rendering sink a flight drives.

use thiserror::Error;
use utpatur_core::{CameraPose, GeoPoint};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("viewport failed: {0}")]
pub struct ViewportError(pub String);

impl ViewportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Camera and marker control of a 3D map view.
///
/// Any error is fatal for the running flight.
pub trait Viewport: Send {
    /// Jump the camera to an absolute pose.
    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), ViewportError>;

    /// Animate the camera to a pose.
    fn fly_to(&mut self, pose: &CameraPose) -> Result<(), ViewportError>;

    fn request_render(&mut self) -> Result<(), ViewportError>;

    /// Show the hiker marker at a ground position, creating it if needed.
    fn place_hiker(&mut self, at: &GeoPoint) -> Result<(), ViewportError>;

    fn remove_hiker(&mut self) -> Result<(), ViewportError>;

    /// The pose currently shown, when the viewport can report it.
    fn current_pose(&self) -> Option<CameraPose>;
}
