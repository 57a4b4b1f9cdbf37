//! Configuration loader — merges config.toml and WAYFINDER_* env vars.
//!
//! `.env` is read by [`load_dotenv`] before logging starts, so it can also
//! carry `RUST_LOG`.

use crate::location::{
    BuiltinGazetteer, FileCityStore, HttpGazetteerClient, LocationError, LocationResolver, NoRemote,
    PersistentGazetteer, PostgrestCityStore, RemoteGazetteer,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_country: String,
    /// Per-call bound on remote/store calls. 0 disables it.
    pub provider_timeout_ms: u64,
    pub remote: RemoteConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Lookup API base URL. The remote provider is off when unset.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Postgrest,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// File store location. Defaults to ~/.wayfinder/cities.json.
    pub path: Option<PathBuf>,
    /// PostgREST project URL.
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_country: crate::location::resolver::DEFAULT_COUNTRY.to_string(),
            provider_timeout_ms: 8_000,
            remote: RemoteConfig::default(),
            store: StoreConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 3000 }
    }
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Load `.env` into the process environment. Variables already set win.
pub fn load_dotenv() -> Result<PathBuf, dotenvy::Error> {
    dotenvy::dotenv()
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wayfinder")
            .join("config.toml")
    }

    /// Load configuration: defaults, then the TOML file (explicit path must
    /// exist; the default path is optional), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, LocationError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, LocationError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LocationError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| LocationError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Override fields from `WAYFINDER_*` variables.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), LocationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(country) = var("WAYFINDER_DEFAULT_COUNTRY").and_then(non_empty) {
            self.default_country = country;
        }
        if let Some(ms) = var("WAYFINDER_PROVIDER_TIMEOUT_MS") {
            self.provider_timeout_ms = ms.trim().parse().map_err(|_| {
                LocationError::Config("WAYFINDER_PROVIDER_TIMEOUT_MS must be an integer >= 0".into())
            })?;
        }
        if let Some(url) = var("WAYFINDER_REMOTE_URL") {
            self.remote.base_url = non_empty(url);
        }
        if let Some(key) = var("WAYFINDER_REMOTE_API_KEY") {
            self.remote.api_key = non_empty(key);
        }
        if let Some(kind) = var("WAYFINDER_STORE") {
            self.store.kind = match kind.trim().to_ascii_lowercase().as_str() {
                "file" => StoreKind::File,
                "postgrest" | "supabase" => StoreKind::Postgrest,
                other => {
                    return Err(LocationError::Config(format!(
                        "WAYFINDER_STORE must be 'file' or 'postgrest', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(path) = var("WAYFINDER_STORE_PATH").and_then(non_empty) {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(url) = var("WAYFINDER_STORE_URL") {
            self.store.url = non_empty(url);
        }
        if let Some(key) = var("WAYFINDER_STORE_API_KEY") {
            self.store.api_key = non_empty(key);
        }
        if let Some(host) = var("WAYFINDER_HOST").and_then(non_empty) {
            self.server.host = host;
        }
        if let Some(port) = var("WAYFINDER_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| LocationError::Config("WAYFINDER_PORT must be a port number".into()))?;
        }
        if let Some(offline) = var("WAYFINDER_OFFLINE") {
            if parse_bool(&offline) {
                self.remote.base_url = None;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), LocationError> {
        let mut issues: Vec<String> = Vec::new();

        if self.default_country.trim().is_empty() {
            issues.push("default_country must not be empty".into());
        }
        if let Some(url) = &self.remote.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                issues.push("remote.base_url must be an http(s) URL".into());
            }
        }
        if self.store.kind == StoreKind::Postgrest {
            match &self.store.url {
                None => issues.push("store.url is required for the postgrest store".into()),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    issues.push("store.url must be an http(s) URL".into())
                }
                Some(_) => {}
            }
            if self.store.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                issues.push("store.api_key is required for the postgrest store".into());
            }
        }
        if self.server.port == 0 {
            issues.push("server.port must be > 0".into());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(LocationError::Config(format!(
                "Invalid config:\n - {}",
                issues.join("\n - ")
            )))
        }
    }

    pub fn provider_timeout(&self) -> Option<Duration> {
        (self.provider_timeout_ms > 0).then(|| Duration::from_millis(self.provider_timeout_ms))
    }

    /// Wire the three providers into a resolver. `offline` forces the
    /// remote provider off regardless of config. Fails when the file store
    /// exists but cannot be loaded.
    pub fn build_resolver(&self, offline: bool) -> Result<LocationResolver, LocationError> {
        let remote: Arc<dyn RemoteGazetteer> = match (&self.remote.base_url, offline) {
            (Some(url), false) => Arc::new(HttpGazetteerClient::new(url, self.remote.api_key.clone())),
            _ => Arc::new(NoRemote),
        };

        let store: Arc<dyn PersistentGazetteer> = match self.store.kind {
            StoreKind::Postgrest => Arc::new(PostgrestCityStore::new(
                self.store.url.as_deref().unwrap_or_default(),
                self.store.api_key.as_deref().unwrap_or_default(),
            )),
            StoreKind::File => match &self.store.path {
                Some(path) => Arc::new(FileCityStore::load_from(path.clone())?),
                None => Arc::new(FileCityStore::load()?),
            },
        };

        let resolver = LocationResolver::new(Arc::new(BuiltinGazetteer::new()), remote, store)
            .with_default_country(&self.default_country);
        Ok(match self.provider_timeout() {
            Some(timeout) => resolver.with_timeout(timeout),
            None => resolver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.default_country, "India");
        assert_eq!(config.provider_timeout(), Some(Duration::from_secs(8)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_country = "Nepal"

[remote]
base_url = "https://geo.example.com/v1"

[server]
port = 8080
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.default_country, "Nepal");
        assert_eq!(config.remote.base_url.as_deref(), Some("https://geo.example.com/v1"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.store.kind, StoreKind::File);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/wayfinder.toml"))).unwrap_err();
        assert!(matches!(err, LocationError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("WAYFINDER_DEFAULT_COUNTRY", "Thailand"),
                ("WAYFINDER_PROVIDER_TIMEOUT_MS", "0"),
                ("WAYFINDER_STORE", "supabase"),
                ("WAYFINDER_STORE_URL", "https://abc.supabase.co"),
                ("WAYFINDER_STORE_API_KEY", "anon-key"),
                ("WAYFINDER_PORT", "9000"),
            ]))
            .unwrap();
        assert_eq!(config.default_country, "Thailand");
        assert_eq!(config.provider_timeout(), None);
        assert_eq!(config.store.kind, StoreKind::Postgrest);
        assert_eq!(config.server.port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("WAYFINDER_PORT", "http")])).is_err());
        assert!(config.apply_env(env(&[("WAYFINDER_STORE", "redis")])).is_err());
    }

    #[test]
    fn test_offline_env_drops_remote() {
        let mut config = Config::default();
        config.remote.base_url = Some("https://geo.example.com".into());
        config.apply_env(env(&[("WAYFINDER_OFFLINE", "1")])).unwrap();
        assert!(config.remote.base_url.is_none());
    }

    #[test]
    fn test_validate_collects_issues() {
        let mut config = Config::default();
        config.store.kind = StoreKind::Postgrest;
        config.remote.base_url = Some("ftp://geo".into());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("store.url is required"));
        assert!(err.contains("store.api_key is required"));
        assert!(err.contains("remote.base_url"));
    }

    #[tokio::test]
    async fn test_build_resolver_offline() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.path = Some(dir.path().join("cities.json"));
        config.remote.base_url = Some("http://127.0.0.1:9".into());

        let resolver = config.build_resolver(true).unwrap();
        assert_eq!(resolver.default_country(), "India");
        let result = resolver.search_locations("mumbai", None, None).await;
        assert_eq!(result.locations[0].id, "static-mumbai");
    }

    #[test]
    fn test_build_resolver_rejects_malformed_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cities.json");
        std::fs::write(&path, r#"{"cities": [{"id": "city-1", "name": "Hampi", "country": "India"},]}"#).unwrap();
        let mut config = Config::default();
        config.store.path = Some(path);

        let err = config.build_resolver(true).err().unwrap();
        assert!(err.to_string().contains("not a valid city store"));
    }
}
