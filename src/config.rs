use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use url::Url;

pub const DEFAULT_CLERK_API_URL: &str = "https://api.clerk.com/v1";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/app.sqlite";
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub clerk_webhook_secret: Option<String>,
    pub clerk_secret_key: Option<String>,
    pub clerk_api_url: Url,
    pub webhook_rps: u32,
    pub identity_timeout_secs: u64,
    pub session_ttl_secs: i64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let clerk_api_url = get_env_or("CLERK_API_URL", DEFAULT_CLERK_API_URL);
        let clerk_api_url = Url::parse(&clerk_api_url)
            .map_err(|e| Error::Config(format!("Invalid value for CLERK_API_URL: {}", e)))?;

        Ok(Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:3010"),
            database_url: get_env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            jwt_secret: get_env("JWT_SECRET")?,
            clerk_webhook_secret: get_optional_env("CLERK_WEBHOOK_SECRET"),
            clerk_secret_key: get_optional_env("CLERK_SECRET_KEY"),
            clerk_api_url,
            webhook_rps: get_env_parse_or("WEBHOOK_RPS", 50)?,
            identity_timeout_secs: get_env_parse_or("IDENTITY_TIMEOUT_SECS", 10)?,
            session_ttl_secs: get_env_parse_or("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

/// Empty values count as unset.
fn get_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or(name: &str, default: &str) -> String {
    get_optional_env(name).unwrap_or_else(|| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
