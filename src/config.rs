use serde::Deserialize;
use std::env;
use std::fs;
use std::str::FromStr;

use crate::error::{AppError, Result};

const CONFIG_PATH: &str = "config.toml";

const DEFAULT_SERVER_PORT: u16 = 8000;
const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS: i64 = 7;

/// Runtime settings, read from `config.toml` when present with environment
/// variables taking precedence.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_port: u16,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    /// Local libsql database path for `db` builds; a remote database is
    /// configured through LIBSQL_URL/LIBSQL_AUTH_TOKEN instead
    pub database_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_port: Option<u16>,
    secret_key: Option<String>,
    access_token_expire_minutes: Option<i64>,
    refresh_token_expire_days: Option<i64>,
    database_path: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let file: FileSettings = match fs::read_to_string(CONFIG_PATH) {
            Ok(content) => toml::from_str(&content)?,
            Err(_) => FileSettings::default(),
        };

        let secret_key = env::var("SECRET_KEY")
            .ok()
            .or(file.secret_key)
            .ok_or_else(|| {
                AppError::Config(
                    "SECRET_KEY is not set (environment or config.toml)".to_string(),
                )
            })?;

        Ok(Self {
            server_port: env_parsed("SERVER_PORT")?
                .or(file.server_port)
                .unwrap_or(DEFAULT_SERVER_PORT),
            secret_key,
            access_token_expire_minutes: env_parsed("ACCESS_TOKEN_EXPIRE_MINUTES")?
                .or(file.access_token_expire_minutes)
                .unwrap_or(DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES),
            refresh_token_expire_days: env_parsed("REFRESH_TOKEN_EXPIRE_DAYS")?
                .or(file.refresh_token_expire_days)
                .unwrap_or(DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS),
            database_path: env::var("DATABASE_PATH").ok().or(file.database_path),
        })
    }

    /// Fixed settings for tests; no files or environment involved
    #[doc(hidden)]
    pub fn for_tests(secret_key: &str) -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            secret_key: secret_key.to_string(),
            access_token_expire_minutes: DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
            refresh_token_expire_days: DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS,
            database_path: None,
        }
    }
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("Failed to parse {key}='{raw}'"))),
        Err(_) => Ok(None),
    }
}
