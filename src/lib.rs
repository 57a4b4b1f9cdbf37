//! Wayfinder — location search aggregation for travel booking.
//!
//! One [`location::LocationResolver`] per process answers autocomplete,
//! popular-city, country and point lookups by merging a built-in gazetteer,
//! a remote lookup API and a city store, with a short-lived query cache.

pub mod config;
pub mod location;
pub mod server;
