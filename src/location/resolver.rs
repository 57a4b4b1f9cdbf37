//! Location resolver — merges providers behind one cached query surface.
//!
//! Search flow:  query guard → cache → built-in gazetteer → (remote ∥ store) → merge → rank → cache
//! Lists flow:   cache → remote → store → empty
//! By id:        remote → store → None
//! Admin writes: store → clear whole cache on success

use super::cache::{CacheKey, CachedData, Clock, LocationCache, SystemClock};
use super::providers::{PersistentGazetteer, RemoteGazetteer, StaticGazetteer};
use super::types::{Country, Location, LocationError, NewCity, ProviderOutcome, SearchParams, SearchResult};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const MIN_QUERY_CHARS: usize = 2;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_POPULAR_LIMIT: usize = 20;
pub const DEFAULT_COUNTRY: &str = "India";

/// The location resolver. Build one per process and share it.
pub struct LocationResolver {
    gazetteer: Arc<dyn StaticGazetteer>,
    remote: Arc<dyn RemoteGazetteer>,
    store: Arc<dyn PersistentGazetteer>,
    cache: Mutex<LocationCache>,
    default_country: String,
    timeout: Option<Duration>,
}

impl LocationResolver {
    pub fn new(
        gazetteer: Arc<dyn StaticGazetteer>,
        remote: Arc<dyn RemoteGazetteer>,
        store: Arc<dyn PersistentGazetteer>,
    ) -> Self {
        Self {
            gazetteer,
            remote,
            store,
            cache: Mutex::new(LocationCache::new(Arc::new(SystemClock))),
            default_country: DEFAULT_COUNTRY.to_string(),
            timeout: None,
        }
    }

    /// Replace the cache clock (for testing expiry).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = Mutex::new(LocationCache::new(clock));
        self
    }

    /// Bound every remote/store call; a call that runs over counts as failed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_default_country(mut self, country: &str) -> Self {
        self.default_country = country.to_string();
        self
    }

    pub fn default_country(&self) -> &str {
        &self.default_country
    }

    fn cache(&self) -> MutexGuard<'_, LocationCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of live cache entries (expired ones count until read).
    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    /// Run one provider call, applying the timeout and turning errors into
    /// a logged [`ProviderOutcome::Failed`].
    async fn call<T, F>(&self, provider: &'static str, op: &'static str, fut: F) -> ProviderOutcome<T>
    where
        F: Future<Output = Result<T, LocationError>>,
    {
        let start = Instant::now();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(r) => r,
                Err(_) => Err(LocationError::Timeout(limit.as_millis() as u64)),
            },
            None => fut.await,
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => debug!(provider, op, elapsed_ms, "provider call ok"),
            Err(e) => warn!(provider, op, elapsed_ms, error = %e, "provider call failed"),
        }
        result.into()
    }

    /// Autocomplete search across all providers.
    ///
    /// Never fails: unavailable providers contribute nothing, and a query
    /// under two characters returns an empty page without touching the
    /// cache or any provider.
    pub async fn search_locations(
        &self,
        query: &str,
        country: Option<&str>,
        limit: Option<usize>,
    ) -> SearchResult {
        if query.chars().count() < MIN_QUERY_CHARS {
            return SearchResult::empty();
        }
        let country = country.unwrap_or(&self.default_country);
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let key = CacheKey::search(query, country, limit);

        let cached = self.cache().get_locations(&key);
        if let Some(cached) = cached {
            debug!(key = key.as_str(), "search cache hit");
            return SearchResult::page(&cached, limit);
        }

        let local = self.gazetteer.search(query, country, limit);

        let params = SearchParams {
            query: query.to_string(),
            country: country.to_string(),
            limit,
        };
        let (remote, stored) = tokio::join!(
            self.call("remote", "search", self.remote.search(&params)),
            self.call("store", "search", self.store.search(&params)),
        );

        let mut merged = local;
        merge_unique(&mut merged, remote.or_empty().locations);
        merge_unique(&mut merged, stored.or_empty().locations);
        rank(&mut merged, query);

        debug!(key = key.as_str(), total = merged.len(), "search cache store");
        let page = SearchResult::page(&merged, limit);
        self.cache().put(key, CachedData::Locations(merged));
        page
    }

    /// Popular cities for a country: remote first, then the store.
    pub async fn get_popular_cities(&self, country: Option<&str>, limit: Option<usize>) -> Vec<Location> {
        let country = country.unwrap_or(&self.default_country);
        let limit = limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
        let key = CacheKey::popular(country, limit);

        let cached = self.cache().get_locations(&key);
        if let Some(cached) = cached {
            debug!(key = key.as_str(), "popular cache hit");
            return cached.into_iter().take(limit).collect();
        }

        let mut outcome = self.call("remote", "popular", self.remote.popular_cities(country)).await;
        if outcome.is_failed() {
            outcome = self.call("store", "popular", self.store.popular_cities(country)).await;
        }

        let Some(cities) = outcome.ok() else {
            return Vec::new();
        };
        let page = cities.iter().take(limit).cloned().collect();
        self.cache().put(key, CachedData::Locations(cities));
        page
    }

    /// Country list: remote first, then the store.
    pub async fn get_countries(&self) -> Vec<Country> {
        let key = CacheKey::countries();
        let cached = self.cache().get_countries(&key);
        if let Some(cached) = cached {
            debug!("countries cache hit");
            return cached;
        }

        let mut outcome = self.call("remote", "countries", self.remote.countries()).await;
        if outcome.is_failed() {
            outcome = self.call("store", "countries", self.store.countries()).await;
        }

        let Some(countries) = outcome.ok() else {
            return Vec::new();
        };
        self.cache().put(key, CachedData::Countries(countries.clone()));
        countries
    }

    /// Point lookup. Not cached.
    pub async fn get_location_by_id(&self, id: &str) -> Option<Location> {
        if let Some(found) = self.call("remote", "by_id", self.remote.by_id(id)).await.ok().flatten() {
            return Some(found);
        }
        self.call("store", "by_id", self.store.by_id(id)).await.ok().flatten()
    }

    /// Add a city to the store. Any success clears the whole cache, since a
    /// new city can change membership and order of many cached searches.
    pub async fn add_city(&self, city: &NewCity) -> Option<Location> {
        let added = self.call("store", "add_city", self.store.add_city(city)).await.ok().flatten();
        match &added {
            Some(loc) => {
                info!(id = %loc.id, name = %loc.name, country = %loc.country, "city added");
                self.clear_cache();
            }
            None => warn!(name = %city.name, "city was not added"),
        }
        added
    }

    /// Set a city's popular flag. Success clears the whole cache.
    pub async fn update_city_popularity(&self, id: &str, is_popular: bool) -> bool {
        let updated = self
            .call("store", "update_popularity", self.store.update_popularity(id, is_popular))
            .await
            .ok()
            .unwrap_or(false);
        if updated {
            info!(id, is_popular, "city popularity updated");
            self.clear_cache();
        } else {
            warn!(id, is_popular, "city popularity was not updated");
        }
        updated
    }
}

/// Append entries whose id is not already present. Dedupe is by id only:
/// providers have separate id spaces, so one place may appear twice.
fn merge_unique(acc: &mut Vec<Location>, extra: Vec<Location>) {
    let mut seen: HashSet<String> = acc.iter().map(|l| l.id.clone()).collect();
    for loc in extra {
        if seen.insert(loc.id.clone()) {
            acc.push(loc);
        }
    }
}

/// Prefix matches first, then popular, then by name. Stable.
fn rank(locations: &mut [Location], query: &str) {
    let q = query.to_lowercase();
    locations.sort_by_cached_key(|l| {
        let prefix = l.name.to_lowercase().starts_with(&q);
        (!prefix, !l.is_popular, l.name.clone())
    });
}
