//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A place record as returned to callers.
///
/// `id` is only unique within the provider that produced it: the built-in
/// gazetteer, the remote API and the city store each have their own id space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
}

impl Location {
    /// Build an ephemeral entry from free-text input (`custom-<millis>` id).
    ///
    /// Custom entries live only in the caller's hands. They are never cached
    /// or stored unless passed to an explicit `add_city`.
    pub fn custom(name: &str, country: &str) -> Self {
        Self {
            id: format!("custom-{}", chrono::Utc::now().timestamp_millis()),
            name: name.trim().to_string(),
            country: country.trim().to_string(),
            state: None,
            coordinates: None,
            is_popular: false,
            population: None,
        }
    }

    pub fn is_custom(&self) -> bool {
        self.id.starts_with("custom-")
    }
}

/// A country as listed by the countries operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// Admin input for adding a city to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCity {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub population: Option<u64>,
    #[serde(default)]
    pub is_popular: bool,
}

/// Parameters of a search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub country: String,
    pub limit: usize,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub locations: Vec<Location>,
    pub total: usize,
    pub has_more: bool,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Take the first `limit` entries of a full ranked list.
    pub fn page(all: &[Location], limit: usize) -> Self {
        let total = all.len();
        Self {
            locations: all.iter().take(limit).cloned().collect(),
            total,
            has_more: total > limit,
        }
    }
}

/// Location subsystem errors.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider timed out after {0}ms")]
    Timeout(u64),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one provider call inside the resolver.
///
/// Failures are kept as values so the merge step can collapse them to
/// "this provider contributed nothing" without a catch-all.
#[derive(Debug)]
pub enum ProviderOutcome<T> {
    Ok(T),
    Failed(String),
}

impl<T> ProviderOutcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(v) => Some(v),
            Self::Failed(_) => None,
        }
    }
}

impl<T: Default> ProviderOutcome<T> {
    /// Collapse to the provider's data, or an empty value on failure.
    pub fn or_empty(self) -> T {
        self.ok().unwrap_or_default()
    }
}

impl<T> From<Result<T, LocationError>> for ProviderOutcome<T> {
    fn from(r: Result<T, LocationError>) -> Self {
        match r {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(id: &str, name: &str) -> Location {
        Location {
            id: id.into(),
            name: name.into(),
            country: "India".into(),
            state: None,
            coordinates: None,
            is_popular: false,
            population: None,
        }
    }

    #[test]
    fn test_page_slices_and_counts() {
        let all = vec![loc("a", "Agra"), loc("b", "Bhopal"), loc("c", "Chennai")];
        let page = SearchResult::page(&all, 2);
        assert_eq!(page.locations.len(), 2);
        assert_eq!(page.total, 3);
        assert!(page.has_more);

        let page = SearchResult::page(&all, 3);
        assert!(!page.has_more);
    }

    #[test]
    fn test_custom_location() {
        let custom = Location::custom("  Hampi ", "India");
        assert!(custom.is_custom());
        assert_eq!(custom.name, "Hampi");
        assert!(!custom.is_popular);
    }

    #[test]
    fn test_location_json_shape() {
        let mut l = loc("s1", "Pune");
        l.is_popular = true;
        let json = serde_json::to_value(&l).unwrap();
        assert_eq!(json["isPopular"], true);
        assert!(json.get("state").is_none());

        let back: Location = serde_json::from_str(r#"{"id":"x","name":"Goa","country":"India"}"#).unwrap();
        assert!(!back.is_popular);
        assert!(back.coordinates.is_none());
    }

    #[test]
    fn test_provider_outcome_collapse() {
        let failed: ProviderOutcome<Vec<Location>> =
            Err(LocationError::Network("connection refused".into())).into();
        assert!(failed.is_failed());
        assert!(failed.or_empty().is_empty());

        let ok: ProviderOutcome<Vec<Location>> = Ok(vec![loc("a", "Agra")]).into();
        assert_eq!(ok.or_empty().len(), 1);
    }
}
