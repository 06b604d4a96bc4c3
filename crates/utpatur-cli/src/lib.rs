//! Utpatur CLI library
//!
//! Binaries:
//! - `fly_itinerary`: fly a saved or built-in itinerary headlessly, printing flight events
//! - `decode_path`: decode an encoded leg geometry and summarise it

pub mod sim;
