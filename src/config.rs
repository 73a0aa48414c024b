use std::{env, fmt, str::FromStr};

pub const DB_URL: &str = "POLLSTER_DB_URL";
pub const HOST: &str = "POLLSTER_HOST";
pub const PORT: &str = "POLLSTER_PORT";
pub const MAX_CONNECTIONS: &str = "POLLSTER_MAX_CONNECTIONS";
pub const AUTH_URL: &str = "POLLSTER_AUTH_URL";
pub const AUTH_API_KEY: &str = "POLLSTER_AUTH_API_KEY";

#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub auth: AuthConfig,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid(key, e) => write!(f, "invalid {} value: {}", key, e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Reads the process environment. Call `dotenv` first to pick up a `.env` file.
    pub fn load() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where F: Fn(&str) -> Option<String> {
        Ok(Config {
            db_url: required(&lookup, DB_URL)?,
            host: or_default(&lookup, HOST, "0.0.0.0".to_owned())?,
            port: or_default(&lookup, PORT, 8080)?,
            max_connections: or_default(&lookup, MAX_CONNECTIONS, 4)?,
            auth: AuthConfig {
                url: required(&lookup, AUTH_URL)?,
                api_key: required(&lookup, AUTH_API_KEY)?,
            },
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where F: Fn(&str) -> Option<String> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            warn!("{} not found", key);
            ConfigError::Missing(key)
        })
}

fn or_default<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where F: Fn(&str) -> Option<String>,
      T: FromStr + fmt::Display,
      T::Err: fmt::Display {
    match lookup(key) {
        Some(value) => value.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(key, e.to_string())),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}
