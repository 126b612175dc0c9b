use std::env;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 1_209_600; // two weeks
const MAX_SESSION_TTL_SECONDS: u64 = 31_536_000; // one year

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,

    // Sessions
    pub session_ttl_seconds: u64,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, env::VarError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or(env::VarError::NotPresent);

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            session_ttl_seconds: lookup("SESSION_TTL_SECONDS")
                .and_then(|s| s.parse().ok())
                .filter(|ttl| (1..=MAX_SESSION_TTL_SECONDS).contains(ttl))
                .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
            secure_cookies: lookup("SECURE_COOKIES")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}
