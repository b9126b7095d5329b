use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the server on the in-process store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    pub page_size: u64,
    pub index_cache_ttl: Duration,
    pub media_root: PathBuf,
    pub max_image_bytes: u64,
}

impl AppConfig {
    pub const DEFAULT_PAGE_SIZE: u64 = 10;
    pub const DEFAULT_INDEX_CACHE_TTL_SECS: u64 = 20;
    pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = parse_var("PORT", 8080)?;
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let page_size = parse_var("PAGE_SIZE", Self::DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            anyhow::bail!("PAGE_SIZE must be positive");
        }
        let index_cache_ttl = Duration::from_secs(parse_var(
            "INDEX_CACHE_TTL_SECS",
            Self::DEFAULT_INDEX_CACHE_TTL_SECS,
        )?);
        let media_root = std::env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("media"));
        let max_image_bytes = parse_var("MAX_IMAGE_BYTES", Self::DEFAULT_MAX_IMAGE_BYTES)?;

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            cors_origins,
            page_size,
            index_cache_ttl,
            media_root,
            max_image_bytes,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
