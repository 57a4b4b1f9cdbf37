//! Location search subsystem for Wayfinder.
//!
//! Merges a built-in gazetteer, a remote lookup API and a city store behind
//! one cached query surface for autocomplete and admin curation.

pub mod cache;
pub mod providers;
pub mod remote;
pub mod resolver;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{Clock, ManualClock, SystemClock};
pub use providers::{BuiltinGazetteer, NoRemote, PersistentGazetteer, RemoteGazetteer, StaticGazetteer};
pub use remote::HttpGazetteerClient;
pub use resolver::LocationResolver;
pub use store::{FileCityStore, PostgrestCityStore};
pub use types::{Coordinates, Country, Location, LocationError, NewCity, SearchParams, SearchResult};
