use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub reader_pool: usize,
    pub default_channel: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("THAW_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("THAW_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = get("THAW_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("THAW_PORT must be a port number")?;
        let reader_pool: usize = match get("THAW_READER_POOL") {
            Some(v) => v.parse().context("THAW_READER_POOL must be a number")?,
            None => thaw_db::DEFAULT_READER_POOL_SIZE,
        };

        Ok(Self {
            db_path: get("THAW_DB_PATH").unwrap_or_else(|| "thaw.db".into()).into(),
            host: get("THAW_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            jwt_secret,
            reader_pool,
            default_channel: get("THAW_DEFAULT_CHANNEL").unwrap_or_else(|| "general".into()),
        })
    }
}
