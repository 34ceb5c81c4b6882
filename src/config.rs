// config.rs
use std::{env, path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} tidak ditemukan di .env")]
    Missing(&'static str),

    #[error("Nilai {key} tidak valid: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub cookie_secure: bool,
    pub cors_origin: String,
    pub site_url: String,
    pub public_base_url: String,
    pub upload_dir: PathBuf,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub admin_name: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port: parse_or(&get, "APP_PORT", 8000)?,
            database_url: required("DATABASE_URL")?,
            max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret: required("JWT_SECRET")?,
            token_ttl_days: parse_or(&get, "TOKEN_TTL_DAYS", 2)?,
            cookie_secure: parse_or(&get, "COOKIE_SECURE", false)?,
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".into()),
            site_url: get("SITE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8000".into())
                .trim_end_matches('/')
                .to_string(),
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "uploads".into())),
            admin_email: get("ADMIN_EMAIL"),
            admin_password: get("ADMIN_PASSWORD"),
            admin_name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".into()),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
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
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "mysql://root@localhost/genre"),
            ("JWT_SECRET", "rahasia"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.site_url, "http://localhost:3000");
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert!(!config.cookie_secure);
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn invalid_port_is_reported_and_urls_lose_trailing_slash() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "mysql://x"),
            ("JWT_SECRET", "x"),
            ("APP_PORT", "delapan ribu"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "APP_PORT", .. }));

        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "mysql://x"),
            ("JWT_SECRET", "x"),
            ("SITE_URL", "https://genre.example/"),
            ("PUBLIC_BASE_URL", "https://cdn.example/"),
        ]))
        .unwrap();
        assert_eq!(config.site_url, "https://genre.example");
        assert_eq!(config.public_base_url, "https://cdn.example");
    }
}
