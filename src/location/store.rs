//! City stores: the writable provider.
//!
//! - [`PostgrestCityStore`]: hosted Postgres through its PostgREST endpoint.
//! - [`FileCityStore`]: a JSON file at `~/.wayfinder/cities.json`, for
//!   offline and local development use.

use super::providers::{blocking, country_matches, PersistentGazetteer};
use super::remote::{id_string, map_ureq};
use super::types::{Coordinates, Country, Location, LocationError, NewCity, SearchParams, SearchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A row of the `cities` table.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct CityRow {
    #[serde(skip_serializing_if = "serde_json::Value::is_null", default)]
    id: serde_json::Value,
    name: String,
    country: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    is_popular: bool,
    #[serde(default)]
    population: Option<u64>,
}

impl CityRow {
    fn from_new(city: &NewCity, id: serde_json::Value) -> Self {
        Self {
            id,
            name: city.name.trim().to_string(),
            country: city.country.trim().to_string(),
            state: city.state.clone(),
            latitude: city.coordinates.map(|c| c.lat),
            longitude: city.coordinates.map(|c| c.lng),
            is_popular: city.is_popular,
            population: city.population,
        }
    }

    fn to_location(&self) -> Location {
        let coordinates = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        };
        Location {
            id: id_string(&self.id),
            name: self.name.clone(),
            country: self.country.clone(),
            state: self.state.clone(),
            coordinates,
            is_popular: self.is_popular,
            population: self.population,
        }
    }
}

// ─── PostgREST store ────────────────────────────────────────────

const REST_TIMEOUT: Duration = Duration::from_secs(10);

/// City store backed by a hosted Postgres `cities` / `countries` schema.
#[derive(Clone)]
pub struct PostgrestCityStore {
    agent: ureq::Agent,
    rest_url: String,
    api_key: String,
}

impl PostgrestCityStore {
    /// `project_url` is the project root (e.g. `https://abc.supabase.co`).
    pub fn new(project_url: &str, api_key: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REST_TIMEOUT).build();
        Self {
            agent,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    fn table(&self, method: &str, table: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}/{}", self.rest_url, table))
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
    }

    async fn fetch_rows(&self, req: ureq::Request) -> Result<Vec<CityRow>, LocationError> {
        blocking(move || {
            req.call()
                .map_err(map_ureq)?
                .into_json::<Vec<CityRow>>()
                .map_err(|e| LocationError::InvalidResponse(e.to_string()))
        })
        .await
    }
}

/// Strip characters PostgREST treats as pattern or filter syntax. `None`
/// when nothing is left to match on.
fn ilike_pattern(query: &str) -> Option<String> {
    let cleaned: String = query
        .chars()
        .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')'))
        .collect();
    (!cleaned.is_empty()).then(|| format!("*{}*", cleaned))
}

/// Total row count from a `Content-Range: 0-9/57` header.
fn content_range_total(header: Option<&str>) -> Option<usize> {
    header?.rsplit('/').next()?.parse().ok()
}

#[async_trait]
impl PersistentGazetteer for PostgrestCityStore {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult, LocationError> {
        let Some(pattern) = ilike_pattern(&params.query) else {
            return Ok(SearchResult::empty());
        };
        let mut req = self
            .table("GET", "cities")
            .set("Prefer", "count=exact")
            .query("select", "*")
            .query("name", &format!("ilike.{}", pattern))
            .query("order", "is_popular.desc,name.asc")
            .query("limit", &params.limit.to_string());
        if !params.country.trim().is_empty() {
            req = req.query("country", &format!("eq.{}", params.country.trim()));
        }

        let limit = params.limit;
        blocking(move || {
            let response = req.call().map_err(map_ureq)?;
            let total_header = content_range_total(response.header("Content-Range"));
            let rows: Vec<CityRow> = response
                .into_json()
                .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
            let locations: Vec<Location> = rows.iter().map(CityRow::to_location).collect();
            let total = total_header.unwrap_or(locations.len());
            Ok(SearchResult { has_more: total > limit, total, locations })
        })
        .await
    }

    async fn popular_cities(&self, country: &str) -> Result<Vec<Location>, LocationError> {
        let mut req = self
            .table("GET", "cities")
            .query("select", "*")
            .query("is_popular", "eq.true")
            .query("order", "name.asc");
        if !country.trim().is_empty() {
            req = req.query("country", &format!("eq.{}", country.trim()));
        }
        let rows = self.fetch_rows(req).await?;
        Ok(rows.iter().map(CityRow::to_location).collect())
    }

    async fn countries(&self) -> Result<Vec<Country>, LocationError> {
        let req = self
            .table("GET", "countries")
            .query("select", "code,name")
            .query("order", "name.asc");
        blocking(move || {
            req.call()
                .map_err(map_ureq)?
                .into_json::<Vec<Country>>()
                .map_err(|e| LocationError::InvalidResponse(e.to_string()))
        })
        .await
    }

    async fn by_id(&self, id: &str) -> Result<Option<Location>, LocationError> {
        let req = self
            .table("GET", "cities")
            .query("select", "*")
            .query("id", &format!("eq.{}", id))
            .query("limit", "1");
        let rows = self.fetch_rows(req).await?;
        Ok(rows.first().map(CityRow::to_location))
    }

    async fn add_city(&self, city: &NewCity) -> Result<Option<Location>, LocationError> {
        let row = CityRow::from_new(city, serde_json::Value::Null);
        let req = self
            .table("POST", "cities")
            .set("Prefer", "return=representation");
        blocking(move || {
            let rows: Vec<CityRow> = req
                .send_json(&row)
                .map_err(map_ureq)?
                .into_json()
                .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
            Ok(rows.first().map(CityRow::to_location))
        })
        .await
    }

    async fn update_popularity(&self, id: &str, is_popular: bool) -> Result<bool, LocationError> {
        let req = self
            .table("PATCH", "cities")
            .set("Prefer", "return=representation")
            .query("id", &format!("eq.{}", id));
        blocking(move || {
            let rows: Vec<CityRow> = req
                .send_json(serde_json::json!({ "is_popular": is_popular }))
                .map_err(map_ureq)?
                .into_json()
                .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
            Ok(!rows.is_empty())
        })
        .await
    }
}

// ─── File store ─────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
struct StoreFile {
    #[serde(default)]
    countries: Vec<Country>,
    #[serde(default)]
    cities: Vec<CityRow>,
}

/// JSON-file city store.
///
/// Writers take `writer` for the whole write, build the next state from a
/// copy, save it on the blocking pool and only then swap it in. Readers
/// never see a state that is not on disk.
#[derive(Clone)]
pub struct FileCityStore {
    path: PathBuf,
    data: Arc<Mutex<StoreFile>>,
    writer: Arc<tokio::sync::Mutex<()>>,
}

impl FileCityStore {
    /// Load from the default location (~/.wayfinder/cities.json).
    pub fn load() -> Result<Self, LocationError> {
        Self::load_from(Self::default_path())
    }

    /// Load from a specific path. A missing file starts empty; a file that
    /// exists but cannot be read or parsed is an error.
    pub fn load_from(path: PathBuf) -> Result<Self, LocationError> {
        let data = Self::read_file(&path)?;
        Ok(Self {
            path,
            data: Arc::new(Mutex::new(data)),
            writer: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wayfinder")
            .join("cities.json")
    }

    fn read_file(path: &Path) -> Result<StoreFile, LocationError> {
        match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                LocationError::Store(format!("{} is not a valid city store: {}", path.display(), e))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StoreFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreFile> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Save `next` to disk, then make it the live state.
    async fn commit(&self, next: StoreFile) -> Result<(), LocationError> {
        let path = self.path.clone();
        let next = blocking(move || {
            write_file(&path, &next)?;
            Ok(next)
        })
        .await?;
        *self.lock() = next;
        Ok(())
    }

    fn next_id(cities: &[CityRow]) -> Result<String, LocationError> {
        let max = cities
            .iter()
            .filter_map(|c| id_string(&c.id).strip_prefix("city-")?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let next = max
            .checked_add(1)
            .ok_or_else(|| LocationError::Store("city id space exhausted".into()))?;
        Ok(format!("city-{}", next))
    }

    /// Number of stored cities.
    pub fn len(&self) -> usize {
        self.lock().cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn write_file(path: &Path, data: &StoreFile) -> Result<(), LocationError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data).map_err(|e| LocationError::Store(e.to_string()))?;
    fs::write(path, json)?;
    Ok(())
}

fn popular_then_name(a: &CityRow, b: &CityRow) -> std::cmp::Ordering {
    b.is_popular.cmp(&a.is_popular).then_with(|| a.name.cmp(&b.name))
}

#[async_trait]
impl PersistentGazetteer for FileCityStore {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult, LocationError> {
        let q = params.query.to_lowercase();
        let data = self.lock();
        let mut rows: Vec<&CityRow> = data
            .cities
            .iter()
            .filter(|c| country_matches(&params.country, &c.country, None))
            .filter(|c| c.name.to_lowercase().contains(&q))
            .collect();
        rows.sort_by(|a, b| popular_then_name(a, b));
        let all: Vec<Location> = rows.into_iter().map(CityRow::to_location).collect();
        Ok(SearchResult::page(&all, params.limit))
    }

    async fn popular_cities(&self, country: &str) -> Result<Vec<Location>, LocationError> {
        let data = self.lock();
        let mut rows: Vec<&CityRow> = data
            .cities
            .iter()
            .filter(|c| c.is_popular && country_matches(country, &c.country, None))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows.into_iter().map(CityRow::to_location).collect())
    }

    async fn countries(&self) -> Result<Vec<Country>, LocationError> {
        let mut countries = self.lock().countries.clone();
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(countries)
    }

    async fn by_id(&self, id: &str) -> Result<Option<Location>, LocationError> {
        let data = self.lock();
        Ok(data.cities.iter().find(|c| id_string(&c.id) == id).map(CityRow::to_location))
    }

    async fn add_city(&self, city: &NewCity) -> Result<Option<Location>, LocationError> {
        if city.name.trim().is_empty() || city.country.trim().is_empty() {
            return Err(LocationError::Store("city name and country are required".into()));
        }
        let _writer = self.writer.lock().await;

        let (next, row) = {
            let data = self.lock();
            // Re-adding the same city is a no-op that returns the existing row.
            if let Some(existing) = data.cities.iter().find(|c| {
                c.name.eq_ignore_ascii_case(city.name.trim())
                    && c.country.eq_ignore_ascii_case(city.country.trim())
                    && c.state == city.state
            }) {
                return Ok(Some(existing.to_location()));
            }
            let id = Self::next_id(&data.cities)?;
            let row = CityRow::from_new(city, serde_json::Value::String(id));
            let mut next = data.clone();
            next.cities.push(row.clone());
            (next, row)
        };

        self.commit(next).await?;
        Ok(Some(row.to_location()))
    }

    async fn update_popularity(&self, id: &str, is_popular: bool) -> Result<bool, LocationError> {
        let _writer = self.writer.lock().await;

        let next = {
            let mut next = self.lock().clone();
            let Some(row) = next.cities.iter_mut().find(|c| id_string(&c.id) == id) else {
                return Ok(false);
            };
            row.is_popular = is_popular;
            next
        };

        self.commit(next).await?;
        Ok(true)
    }
}
