//! Provider contracts and the built-in gazetteer.
//!
//! Three kinds of provider feed the resolver:
//! - [`StaticGazetteer`]: in-process, synchronous, never fails.
//! - [`RemoteGazetteer`]: a network lookup API, any call may fail.
//! - [`PersistentGazetteer`]: the city store, the only writable provider.

use super::types::{Coordinates, Country, Location, LocationError, NewCity, SearchParams, SearchResult};
use async_trait::async_trait;

/// A small pre-loaded list of well-known places.
pub trait StaticGazetteer: Send + Sync {
    fn search(&self, query: &str, country: &str, limit: usize) -> Vec<Location>;
}

/// External lookup provider with broad coverage.
#[async_trait]
pub trait RemoteGazetteer: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult, LocationError>;
    async fn popular_cities(&self, country: &str) -> Result<Vec<Location>, LocationError>;
    async fn countries(&self) -> Result<Vec<Country>, LocationError>;
    async fn by_id(&self, id: &str) -> Result<Option<Location>, LocationError>;
}

/// Database-backed lookup and write provider.
#[async_trait]
pub trait PersistentGazetteer: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult, LocationError>;
    async fn popular_cities(&self, country: &str) -> Result<Vec<Location>, LocationError>;
    async fn countries(&self) -> Result<Vec<Country>, LocationError>;
    async fn by_id(&self, id: &str) -> Result<Option<Location>, LocationError>;
    /// Insert a city. `None` means the store accepted the call but did not
    /// hand back a row.
    async fn add_city(&self, city: &NewCity) -> Result<Option<Location>, LocationError>;
    /// Set the popular flag. `false` means no row matched.
    async fn update_popularity(&self, id: &str, is_popular: bool) -> Result<bool, LocationError>;
}

/// Run blocking provider I/O on tokio's blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, LocationError>
where
    F: FnOnce() -> Result<T, LocationError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LocationError::Unavailable(format!("provider task failed: {}", e)))?
}

/// Does a record's country match a filter given as a name or ISO code?
/// An empty filter matches everything.
pub(crate) fn country_matches(filter: &str, country: &str, code: Option<&str>) -> bool {
    let f = filter.trim();
    f.is_empty()
        || f.eq_ignore_ascii_case(country)
        || code.map_or(false, |c| f.eq_ignore_ascii_case(c))
}

// ─── Offline remote ─────────────────────────────────────────────

/// Remote provider used when no lookup API is configured or `--offline` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemote;

#[async_trait]
impl RemoteGazetteer for NoRemote {
    async fn search(&self, _params: &SearchParams) -> Result<SearchResult, LocationError> {
        Err(offline())
    }

    async fn popular_cities(&self, _country: &str) -> Result<Vec<Location>, LocationError> {
        Err(offline())
    }

    async fn countries(&self) -> Result<Vec<Country>, LocationError> {
        Err(offline())
    }

    async fn by_id(&self, _id: &str) -> Result<Option<Location>, LocationError> {
        Err(offline())
    }
}

fn offline() -> LocationError {
    LocationError::Unavailable("remote lookup disabled".into())
}

// ─── Built-in dataset ───────────────────────────────────────────

struct BuiltinCity {
    id: &'static str,
    names: &'static [&'static str], // canonical + aliases
    state: Option<&'static str>,
    country: &'static str,
    country_code: &'static str,
    lat: f64,
    lng: f64,
    popular: bool,
}

const BUILTIN_CITIES: &[BuiltinCity] = &[
    BuiltinCity {
        id: "static-mumbai", names: &["Mumbai", "Bombay"],
        state: Some("Maharashtra"), country: "India", country_code: "IN",
        lat: 19.0760, lng: 72.8777, popular: true,
    },
    BuiltinCity {
        id: "static-delhi", names: &["Delhi", "New Delhi"],
        state: Some("Delhi"), country: "India", country_code: "IN",
        lat: 28.6139, lng: 77.2090, popular: true,
    },
    BuiltinCity {
        id: "static-bengaluru", names: &["Bengaluru", "Bangalore"],
        state: Some("Karnataka"), country: "India", country_code: "IN",
        lat: 12.9716, lng: 77.5946, popular: true,
    },
    BuiltinCity {
        id: "static-chennai", names: &["Chennai", "Madras"],
        state: Some("Tamil Nadu"), country: "India", country_code: "IN",
        lat: 13.0827, lng: 80.2707, popular: true,
    },
    BuiltinCity {
        id: "static-kolkata", names: &["Kolkata", "Calcutta"],
        state: Some("West Bengal"), country: "India", country_code: "IN",
        lat: 22.5726, lng: 88.3639, popular: true,
    },
    BuiltinCity {
        id: "static-hyderabad", names: &["Hyderabad"],
        state: Some("Telangana"), country: "India", country_code: "IN",
        lat: 17.3850, lng: 78.4867, popular: true,
    },
    BuiltinCity {
        id: "static-pune", names: &["Pune", "Poona"],
        state: Some("Maharashtra"), country: "India", country_code: "IN",
        lat: 18.5204, lng: 73.8567, popular: false,
    },
    BuiltinCity {
        id: "static-jaipur", names: &["Jaipur"],
        state: Some("Rajasthan"), country: "India", country_code: "IN",
        lat: 26.9124, lng: 75.7873, popular: true,
    },
    BuiltinCity {
        id: "static-udaipur", names: &["Udaipur"],
        state: Some("Rajasthan"), country: "India", country_code: "IN",
        lat: 24.5854, lng: 73.7125, popular: false,
    },
    BuiltinCity {
        id: "static-agra", names: &["Agra"],
        state: Some("Uttar Pradesh"), country: "India", country_code: "IN",
        lat: 27.1767, lng: 78.0081, popular: true,
    },
    BuiltinCity {
        id: "static-varanasi", names: &["Varanasi", "Banaras", "Kashi"],
        state: Some("Uttar Pradesh"), country: "India", country_code: "IN",
        lat: 25.3176, lng: 82.9739, popular: false,
    },
    BuiltinCity {
        id: "static-goa", names: &["Goa", "Panaji"],
        state: Some("Goa"), country: "India", country_code: "IN",
        lat: 15.4909, lng: 73.8278, popular: true,
    },
    BuiltinCity {
        id: "static-kochi", names: &["Kochi", "Cochin"],
        state: Some("Kerala"), country: "India", country_code: "IN",
        lat: 9.9312, lng: 76.2673, popular: false,
    },
    BuiltinCity {
        id: "static-munnar", names: &["Munnar"],
        state: Some("Kerala"), country: "India", country_code: "IN",
        lat: 10.0889, lng: 77.0595, popular: false,
    },
    BuiltinCity {
        id: "static-shimla", names: &["Shimla", "Simla"],
        state: Some("Himachal Pradesh"), country: "India", country_code: "IN",
        lat: 31.1048, lng: 77.1734, popular: false,
    },
    BuiltinCity {
        id: "static-manali", names: &["Manali"],
        state: Some("Himachal Pradesh"), country: "India", country_code: "IN",
        lat: 32.2432, lng: 77.1892, popular: true,
    },
    BuiltinCity {
        id: "static-leh", names: &["Leh", "Ladakh"],
        state: Some("Ladakh"), country: "India", country_code: "IN",
        lat: 34.1526, lng: 77.5771, popular: false,
    },
    BuiltinCity {
        id: "static-srinagar", names: &["Srinagar"],
        state: Some("Jammu and Kashmir"), country: "India", country_code: "IN",
        lat: 34.0837, lng: 74.7973, popular: false,
    },
    BuiltinCity {
        id: "static-rishikesh", names: &["Rishikesh"],
        state: Some("Uttarakhand"), country: "India", country_code: "IN",
        lat: 30.0869, lng: 78.2676, popular: false,
    },
    BuiltinCity {
        id: "static-darjeeling", names: &["Darjeeling"],
        state: Some("West Bengal"), country: "India", country_code: "IN",
        lat: 27.0360, lng: 88.2627, popular: false,
    },
    BuiltinCity {
        id: "static-amritsar", names: &["Amritsar"],
        state: Some("Punjab"), country: "India", country_code: "IN",
        lat: 31.6340, lng: 74.8723, popular: false,
    },
    BuiltinCity {
        id: "static-port-blair", names: &["Port Blair", "Andaman"],
        state: Some("Andaman and Nicobar Islands"), country: "India", country_code: "IN",
        lat: 11.6234, lng: 92.7265, popular: false,
    },
    BuiltinCity {
        id: "static-dubai", names: &["Dubai"],
        state: None, country: "United Arab Emirates", country_code: "AE",
        lat: 25.2048, lng: 55.2708, popular: true,
    },
    BuiltinCity {
        id: "static-singapore", names: &["Singapore"],
        state: None, country: "Singapore", country_code: "SG",
        lat: 1.3521, lng: 103.8198, popular: true,
    },
    BuiltinCity {
        id: "static-bangkok", names: &["Bangkok", "Krung Thep"],
        state: None, country: "Thailand", country_code: "TH",
        lat: 13.7563, lng: 100.5018, popular: true,
    },
    BuiltinCity {
        id: "static-bali", names: &["Bali", "Denpasar"],
        state: None, country: "Indonesia", country_code: "ID",
        lat: -8.6500, lng: 115.2167, popular: true,
    },
    BuiltinCity {
        id: "static-kathmandu", names: &["Kathmandu"],
        state: None, country: "Nepal", country_code: "NP",
        lat: 27.7172, lng: 85.3240, popular: false,
    },
    BuiltinCity {
        id: "static-male", names: &["Male", "Maldives"],
        state: None, country: "Maldives", country_code: "MV",
        lat: 4.1755, lng: 73.5093, popular: true,
    },
    BuiltinCity {
        id: "static-paris", names: &["Paris"],
        state: None, country: "France", country_code: "FR",
        lat: 48.8566, lng: 2.3522, popular: true,
    },
    BuiltinCity {
        id: "static-london", names: &["London"],
        state: None, country: "United Kingdom", country_code: "GB",
        lat: 51.5074, lng: -0.1278, popular: true,
    },
];

/// The in-process gazetteer backed by [`BUILTIN_CITIES`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinGazetteer;

impl BuiltinGazetteer {
    pub fn new() -> Self {
        Self
    }

    /// Every built-in place, in dataset order.
    pub fn all(&self) -> Vec<Location> {
        BUILTIN_CITIES.iter().map(builtin_to_location).collect()
    }
}

impl StaticGazetteer for BuiltinGazetteer {
    /// Case-insensitive substring match on the canonical name and aliases.
    fn search(&self, query: &str, country: &str, limit: usize) -> Vec<Location> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }

        BUILTIN_CITIES
            .iter()
            .filter(|c| country_matches(country, c.country, Some(c.country_code)))
            .filter(|c| c.names.iter().any(|n| n.to_lowercase().contains(&q)))
            .take(limit)
            .map(builtin_to_location)
            .collect()
    }
}

fn builtin_to_location(city: &BuiltinCity) -> Location {
    Location {
        id: city.id.to_string(),
        name: city.names[0].to_string(),
        country: city.country.to_string(),
        state: city.state.map(str::to_string),
        coordinates: Some(Coordinates { lat: city.lat, lng: city.lng }),
        is_popular: city.popular,
        population: None,
    }
}
