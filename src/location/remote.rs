//! HTTP client for the remote location lookup API.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET /search?q=&country=&limit=` → `{ locations, total, hasMore }`
//! - `GET /popular?country=` → `[location]`
//! - `GET /countries` → `[{ code, name }]`
//! - `GET /locations/{id}` → `location`, 404 when unknown

use super::providers::{blocking, RemoteGazetteer};
use super::types::{Coordinates, Country, Location, LocationError, SearchParams, SearchResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = "Wayfinder/0.3 (travel-location-search)";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A location as the lookup API spells it.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct RemoteLocation {
    id: serde_json::Value,
    name: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default, alias = "region")]
    state: Option<String>,
    #[serde(default, alias = "latitude")]
    lat: Option<f64>,
    #[serde(default, alias = "longitude", alias = "lon")]
    lng: Option<f64>,
    #[serde(default, alias = "is_popular", alias = "popular")]
    is_popular: bool,
    #[serde(default)]
    population: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RemoteSearchResponse {
    #[serde(default)]
    locations: Vec<RemoteLocation>,
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    has_more: Option<bool>,
}

/// Render a JSON id (string or number) as a string id.
pub(crate) fn id_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RemoteLocation {
    fn into_location(self) -> Location {
        let coordinates = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        };
        Location {
            id: id_string(&self.id),
            name: self.name,
            country: self.country.or(self.country_name).unwrap_or_default(),
            state: self.state,
            coordinates,
            is_popular: self.is_popular,
            population: self.population,
        }
    }
}

/// Turn a ureq failure into a provider error.
pub(crate) fn map_ureq(e: ureq::Error) -> LocationError {
    match e {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            LocationError::Http {
                status,
                body: body.chars().take(300).collect(),
            }
        }
        ureq::Error::Transport(t) => LocationError::Network(t.to_string()),
    }
}

/// Remote lookup API client.
#[derive(Clone)]
pub struct HttpGazetteerClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGazetteerClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, path: &str) -> ureq::Request {
        let req = self.agent.get(&format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.set("X-Api-Key", key),
            None => req,
        }
    }

    /// Issue a GET on the blocking pool and decode the JSON body.
    async fn get_json<T>(&self, req: ureq::Request) -> Result<T, LocationError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        blocking(move || {
            let response = req.call().map_err(map_ureq)?;
            response
                .into_json::<T>()
                .map_err(|e| LocationError::InvalidResponse(e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl RemoteGazetteer for HttpGazetteerClient {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult, LocationError> {
        let req = self
            .request("/search")
            .query("q", &params.query)
            .query("country", &params.country)
            .query("limit", &params.limit.to_string());

        let body: RemoteSearchResponse = self.get_json(req).await?;
        let locations: Vec<Location> = body.locations.into_iter().map(RemoteLocation::into_location).collect();
        let total = body.total.unwrap_or(locations.len());
        let has_more = body.has_more.unwrap_or(total > locations.len());
        Ok(SearchResult { locations, total, has_more })
    }

    async fn popular_cities(&self, country: &str) -> Result<Vec<Location>, LocationError> {
        let req = self.request("/popular").query("country", country);
        let body: Vec<RemoteLocation> = self.get_json(req).await?;
        Ok(body.into_iter().map(RemoteLocation::into_location).collect())
    }

    async fn countries(&self) -> Result<Vec<Country>, LocationError> {
        self.get_json(self.request("/countries")).await
    }

    async fn by_id(&self, id: &str) -> Result<Option<Location>, LocationError> {
        let path = format!("/locations/{}", urlencoding::encode(id));
        match self.get_json::<RemoteLocation>(self.request(&path)).await {
            Ok(loc) => Ok(Some(loc.into_location())),
            Err(LocationError::Http { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
