//! poundtrades/crates/configs/src/lib.rs
//!
//! Typed runtime settings. Values layer in the usual order: built-in
//! defaults, an optional `poundtrades.toml`, then `POUNDTRADES_*`
//! environment overrides (e.g. `POUNDTRADES_CACHE__MAX_ENTRIES=50`).
//! Binaries call `dotenvy::dotenv()` before loading so a local `.env`
//! participates.

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub cache: CacheSettings,
    pub remote: RemoteSettings,
    pub media: MediaSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Seconds a view stays fresh; absent means fresh until invalidated.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Cap on cached query specifications.
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    /// SQLite location for the local backend (`sqlite::memory:` works).
    pub database_url: String,
    /// Milliseconds before a remote call is abandoned as Transient.
    pub timeout_ms: u64,
    /// API key for a hosted backend, when one is configured. Wrapped so it
    /// never shows up in debug output or logs.
    #[serde(default)]
    pub anon_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub root: String,
    pub url_prefix: String,
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Settings {
    pub fn load() -> Result<Settings, ConfigError> {
        let settings = config::Config::builder()
            .set_default("cache.max_entries", 100)?
            .set_default("remote.database_url", "sqlite://poundtrades.db?mode=rwc")?
            .set_default("remote.timeout_ms", 10_000)?
            .set_default("media.root", "./data/uploads")?
            .set_default("media.url_prefix", "/static/uploads")?
            .set_default("media.max_width", 1000)?
            .set_default("media.jpeg_quality", 70)?
            .add_source(config::File::with_name("poundtrades").required(false))
            .add_source(
                config::Environment::with_prefix("POUNDTRADES").separator("__"),
            )
            .build()?
            .try_deserialize::<Settings>()?;
        tracing::debug!(
            max_entries = settings.cache.max_entries,
            ttl_secs = ?settings.cache.ttl_secs,
            "settings loaded"
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let settings = Settings::load().unwrap();
        assert_eq!(settings.cache.max_entries, 100);
        assert_eq!(settings.cache.ttl_secs, None);
        assert_eq!(settings.remote.timeout_ms, 10_000);
        assert_eq!(settings.media.max_width, 1000);
        assert!(settings.remote.anon_key.is_none());
    }
}
