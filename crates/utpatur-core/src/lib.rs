pub mod distance_index;
pub mod flight;
pub mod framing;
pub mod itinerary;
pub mod models;
pub mod polyline;
pub mod profile;
pub mod spatial;
pub mod terrain_cache;
pub mod tuning;

pub use distance_index::{DistanceIndex, PathLocation};
pub use flight::{
    adaptive_targets, advance, AdaptiveOffsets, FlightContext, FlightError, FlightFrame,
    FlightSession, FlightState, FlightStatus, FlyingMode, SlopeKind, Tick,
};
pub use framing::{overview_pose, Bounds, BOUNDS_MARGIN_DEG};
pub use itinerary::{flatten, Itinerary, Leg, RouteTotals, Stop};
pub use models::{CameraPose, FlightPlan, GeoPoint, PathSample, WaypointMarker};
pub use polyline::{decode, decode_with_altitude, encode};
pub use profile::{build_profile, format_thousands, ProfileAxis, ProfilePoint};
pub use spatial::{bearing_deg, distance_between, haversine_distance};
pub use terrain_cache::{evenly_spaced_indices, TerrainHeightCache};
pub use tuning::{FlightTuning, SpeedSelector, TerrainTuning};
