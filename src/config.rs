/*
 * Responsibility
 * - Load settings from the environment (.env honoured via dotenvy)
 * - Validate them; anything missing or malformed fails startup
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub const DEFAULT_EXEMPT_PATHS: &str = "/health,/users,/auth/token";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,

    // Trusted reverse proxies in front of us (X-Forwarded-For hops).
    pub proxy_count: usize,

    pub token_ttl: Duration,
    pub token_cache_capacity: usize,
    pub token_sweep_interval: Duration,
    pub exempt_paths: Vec<String>,

    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&get, "PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let app_env = AppEnv::parse(get("APP_ENV").as_deref());

        let cors_allowed_origins = split_list(get("CORS_ALLOWED_ORIGINS").unwrap_or_default());

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            Some(f) if f == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        // A typo here would silently change which address gets logged; refuse it.
        let proxy_count: usize = parse_or(&get, "PROXY_COUNT", 0)?;

        let token_ttl_seconds: u64 = parse_or(&get, "TOKEN_TTL_SECONDS", 600)?;
        if token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("TOKEN_TTL_SECONDS"));
        }

        let token_cache_capacity: usize = parse_or(&get, "TOKEN_CACHE_CAPACITY", 100_000)?;
        if token_cache_capacity == 0 {
            return Err(ConfigError::Invalid("TOKEN_CACHE_CAPACITY"));
        }

        let token_sweep_interval_seconds: u64 =
            parse_or(&get, "TOKEN_SWEEP_INTERVAL_SECONDS", 60)?;
        if token_sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid("TOKEN_SWEEP_INTERVAL_SECONDS"));
        }

        let exempt_paths = split_list(
            get("AUTH_EXEMPT_PATHS").unwrap_or_else(|| DEFAULT_EXEMPT_PATHS.to_string()),
        );

        let max_body_bytes: usize = parse_or(&get, "MAX_BODY_BYTES", 100 * 1024 * 1024)?;
        let request_timeout_seconds: u64 = parse_or(&get, "REQUEST_TIMEOUT_SECONDS", 30)?;

        Ok(Self {
            addr,
            database_url,
            app_env,
            cors_allowed_origins,
            log_format,
            proxy_count,
            token_ttl: Duration::from_secs(token_ttl_seconds),
            token_cache_capacity,
            token_sweep_interval: Duration::from_secs(token_sweep_interval_seconds),
            exempt_paths,
            max_body_bytes,
            request_timeout: Duration::from_secs(request_timeout_seconds),
        })
    }
}

fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
    }
}

fn split_list(raw: String) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
