pub mod backoff;
pub mod cache;
pub mod config;
pub mod controller;
pub mod frames;
pub mod provider;
pub mod terrain;
pub mod viewport;

pub use config::Config;
pub use controller::{ControllerGone, FlightController, FlightEvent, FlightHandle, StopReason};
pub use frames::{FrameSource, IntervalFrames};
pub use provider::{NoTerrain, OpenMeteoProvider, TerrainError, TerrainProvider};
pub use terrain::{prepare_terrain, CancelSignal, PrepareError};
pub use viewport::{Viewport, ViewportError};
