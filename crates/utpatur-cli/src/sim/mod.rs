//! Headless flight helpers shared by the CLI binaries.

pub mod scenarios;
pub mod viewport;

pub use scenarios::{
    create_kebnekaise_scenario, create_kungsleden_scenario, create_loop_scenario, DemoRoute,
};
pub use viewport::{LoggingViewport, ViewportRecord};
