//! Recording fakes for the three provider seams, plus a local HTTP stub
//! for exercising the real clients.

use super::providers::{PersistentGazetteer, RemoteGazetteer, StaticGazetteer};
use super::types::{Country, Location, LocationError, NewCity, SearchParams, SearchResult};
use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::{Query, Request};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn city(id: &str, name: &str) -> Location {
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

pub fn popular(id: &str, name: &str) -> Location {
    Location { is_popular: true, ..city(id, name) }
}

fn down() -> LocationError {
    LocationError::Network("connection refused".into())
}

/// Returns the same list for every query.
#[derive(Default)]
pub struct FakeGazetteer {
    results: Vec<Location>,
    calls: AtomicUsize,
}

impl FakeGazetteer {
    pub fn with(results: Vec<Location>) -> Self {
        Self { results, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StaticGazetteer for FakeGazetteer {
    fn search(&self, _query: &str, _country: &str, limit: usize) -> Vec<Location> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results.iter().take(limit).cloned().collect()
    }
}

/// Canned answers shared by the remote and store fakes.
#[derive(Default)]
struct Canned {
    search: Vec<Location>,
    popular: Vec<Location>,
    countries: Vec<Country>,
    by_id: Vec<Location>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Canned {
    async fn enter(&self) -> Result<(), LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(down());
        }
        Ok(())
    }

    fn page(&self, limit: usize) -> SearchResult {
        SearchResult::page(&self.search, limit)
    }

    fn find(&self, id: &str) -> Option<Location> {
        self.by_id.iter().chain(&self.search).chain(&self.popular).find(|l| l.id == id).cloned()
    }
}

macro_rules! canned_builders {
    ($ty:ident) => {
        impl $ty {
            pub fn with_search(search: Vec<Location>) -> Self {
                Self(Canned { search, ..Canned::default() })
            }

            pub fn failing() -> Self {
                Self(Canned { fail: true, ..Canned::default() })
            }

            pub fn delayed(mut self, delay: Duration) -> Self {
                self.0.delay = Some(delay);
                self
            }

            pub fn popular(mut self, popular: Vec<Location>) -> Self {
                self.0.popular = popular;
                self
            }

            pub fn countries(mut self, countries: Vec<Country>) -> Self {
                self.0.countries = countries;
                self
            }

            pub fn by_id(mut self, by_id: Vec<Location>) -> Self {
                self.0.by_id = by_id;
                self
            }

            pub fn calls(&self) -> usize {
                self.0.calls.load(Ordering::SeqCst)
            }
        }
    };
}

#[derive(Default)]
pub struct FakeRemote(Canned);

#[derive(Default)]
pub struct FakeStore(Canned);

canned_builders!(FakeRemote);
canned_builders!(FakeStore);

#[async_trait]
impl RemoteGazetteer for FakeRemote {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult, LocationError> {
        self.0.enter().await?;
        Ok(self.0.page(params.limit))
    }

    async fn popular_cities(&self, _country: &str) -> Result<Vec<Location>, LocationError> {
        self.0.enter().await?;
        Ok(self.0.popular.clone())
    }

    async fn countries(&self) -> Result<Vec<Country>, LocationError> {
        self.0.enter().await?;
        Ok(self.0.countries.clone())
    }

    async fn by_id(&self, id: &str) -> Result<Option<Location>, LocationError> {
        self.0.enter().await?;
        Ok(self.0.by_id.iter().find(|l| l.id == id).cloned())
    }
}

#[async_trait]
impl PersistentGazetteer for FakeStore {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult, LocationError> {
        self.0.enter().await?;
        Ok(self.0.page(params.limit))
    }

    async fn popular_cities(&self, _country: &str) -> Result<Vec<Location>, LocationError> {
        self.0.enter().await?;
        Ok(self.0.popular.clone())
    }

    async fn countries(&self) -> Result<Vec<Country>, LocationError> {
        self.0.enter().await?;
        Ok(self.0.countries.clone())
    }

    async fn by_id(&self, id: &str) -> Result<Option<Location>, LocationError> {
        self.0.enter().await?;
        Ok(self.0.by_id.iter().find(|l| l.id == id).cloned())
    }

    async fn add_city(&self, city: &NewCity) -> Result<Option<Location>, LocationError> {
        self.0.enter().await?;
        Ok(Some(Location {
            id: format!("db-{}", city.name.to_lowercase().replace(' ', "-")),
            name: city.name.clone(),
            country: city.country.clone(),
            state: city.state.clone(),
            coordinates: city.coordinates,
            is_popular: city.is_popular,
            population: city.population,
        }))
    }

    async fn update_popularity(&self, id: &str, _is_popular: bool) -> Result<bool, LocationError> {
        self.0.enter().await?;
        Ok(self.0.find(id).is_some())
    }
}

// ─── HTTP stub ──────────────────────────────────────────────────

/// One request as the stub server received it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    /// Raw path, still percent-encoded.
    pub path: String,
    /// Decoded query parameters.
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// An axum server on an ephemeral local port that answers every request
/// with `respond` and records what it saw.
pub struct StubServer {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl StubServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&SeenRequest) -> Response + Send + Sync + 'static,
    {
        let seen: Arc<Mutex<Vec<SeenRequest>>> = Arc::default();
        let respond = Arc::new(respond);
        let recorder = seen.clone();

        let app = Router::new().fallback(move |req: Request| {
            let recorder = recorder.clone();
            let respond = respond.clone();
            async move {
                let (parts, body) = req.into_parts();
                let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
                let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
                    .map(|q| q.0)
                    .unwrap_or_default();
                let request = SeenRequest {
                    method: parts.method.to_string(),
                    path: parts.uri.path().to_string(),
                    query,
                    headers: parts.headers,
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                };
                let response = respond(&request);
                recorder.lock().unwrap().push(request);
                response
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url: format!("http://{}", addr), seen }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// The only request received; panics if there were more or fewer.
    pub fn single(&self) -> SeenRequest {
        let mut seen = self.requests();
        assert_eq!(seen.len(), 1, "expected one request, got {:?}", seen);
        seen.remove(0)
    }
}
