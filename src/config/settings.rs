//! Process settings from environment (optionally seeded from `.env`).

use crate::config::DEFAULT_VIDEO_MAX_KB;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

/// Which `EntityStore` implementation backs the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Validation(format!(
                "invalid STORE_BACKEND: {} (expected postgres or memory)",
                s
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub store: StoreBackend,
    pub database_url: String,
    /// Schema holding catalog tables. Must be a valid PostgreSQL identifier.
    pub schema: String,
    pub bind_addr: String,
    pub upload_dir: PathBuf,
    pub max_body_bytes: usize,
    pub video_max_kb: u64,
    /// Optional JSON catalog replacing the built-in one.
    pub catalog_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            store: StoreBackend::Postgres,
            database_url: "postgres://localhost/media_catalog".into(),
            schema: "catalog".into(),
            bind_addr: "0.0.0.0:3000".into(),
            upload_dir: PathBuf::from("storage/uploads"),
            max_body_bytes: 64 * 1024 * 1024,
            video_max_kb: DEFAULT_VIDEO_MAX_KB,
            catalog_path: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Settings::default();
        if let Some(v) = lookup("STORE_BACKEND") {
            s.store = v.parse()?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = lookup("CATALOG_SCHEMA") {
            if v.is_empty() || !v.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ConfigError::Validation(format!("invalid CATALOG_SCHEMA: {}", v)));
            }
            s.schema = v;
        }
        if let Some(v) = lookup("BIND_ADDR") {
            s.bind_addr = v;
        }
        if let Some(v) = lookup("UPLOAD_DIR") {
            s.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MAX_BODY_BYTES") {
            s.max_body_bytes = v
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid MAX_BODY_BYTES: {}", v)))?;
        }
        if let Some(v) = lookup("VIDEO_MAX_KB") {
            s.video_max_kb = v
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid VIDEO_MAX_KB: {}", v)))?;
        }
        s.catalog_path = lookup("CATALOG_CONFIG").filter(|v| !v.is_empty()).map(PathBuf::from);
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.store, StoreBackend::Postgres);
        assert_eq!(s.schema, "catalog");
        assert!(s.catalog_path.is_none());
    }

    #[test]
    fn reads_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("STORE_BACKEND", "memory"),
            ("CATALOG_SCHEMA", "media"),
            ("VIDEO_MAX_KB", "12"),
            ("CATALOG_CONFIG", "catalog.json"),
        ]))
        .unwrap();
        assert_eq!(s.store, StoreBackend::Memory);
        assert_eq!(s.schema, "media");
        assert_eq!(s.video_max_kb, 12);
        assert_eq!(s.catalog_path, Some(PathBuf::from("catalog.json")));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Settings::from_lookup(lookup(&[("STORE_BACKEND", "redis")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("CATALOG_SCHEMA", "a;drop")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("MAX_BODY_BYTES", "lots")])).is_err());
    }
}
