use std::{
    env,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};
use log::LevelFilter;

use crate::error::{SiagaError, SiagaResult};


const DEFAULT_HTTP_TIMEOUT: u64 = 10; // seconds
const DEFAULT_SESSION_TTL: u64 = 30 * 60; // seconds
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_OUTBOX: &'static str = "outbox/";
const DEFAULT_MAIL_FROM: &'static str = "noreply@geosiaga.id";


/// Where reports, routes and shelters live.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendTarget {
    Postgres(String),
    Remote(String),
}


#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendTarget,
    pub http_timeout: Duration,
    pub news_url: Option<String>,
    pub mail_outbox: PathBuf,
    pub mail_from: String,
    pub session_ttl: Duration,
    pub workers: usize,
    pub log_level: LevelFilter,
    pub sentry_dsn: Option<String>,
}

impl Config {
    pub fn from_env() -> SiagaResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> SiagaResult<Self> where
        F: Fn(&str) -> Option<String> {

        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match (var("SIAGA_BACKEND_URL"), var("DATABASE_URL")) {
            (Some(url), _) => BackendTarget::Remote(url.trim_end_matches('/').to_owned()),
            (None, Some(url)) => BackendTarget::Postgres(url),
            (None, None) => return Err(SiagaError::Config(
                "either SIAGA_BACKEND_URL or DATABASE_URL must be set".into())),
        };

        Ok(Config {
            backend,
            http_timeout: Duration::new(parse_or(var("SIAGA_HTTP_TIMEOUT"), "SIAGA_HTTP_TIMEOUT", DEFAULT_HTTP_TIMEOUT)?, 0),
            news_url: var("SIAGA_NEWS_URL"),
            mail_outbox: PathBuf::from(var("SIAGA_MAIL_OUTBOX").unwrap_or_else(|| DEFAULT_OUTBOX.into())),
            mail_from: var("SIAGA_MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.into()),
            session_ttl: Duration::new(parse_or(var("SIAGA_SESSION_TTL"), "SIAGA_SESSION_TTL", DEFAULT_SESSION_TTL)?, 0),
            workers: parse_or(var("SIAGA_WORKERS"), "SIAGA_WORKERS", DEFAULT_WORKERS)?.max(1),
            log_level: parse_or(var("SIAGA_LOG_LEVEL"), "SIAGA_LOG_LEVEL", LevelFilter::Info)?,
            sentry_dsn: var("SENTRY_DSN"),
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> SiagaResult<T> {
    match value {
        Some(v) => v.trim().parse()
            .map_err(|_| SiagaError::Config(format!("{} has an invalid value: {}", key, v))),
        None => Ok(default),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_of(pairs: &[(&str, &str)]) -> SiagaResult<Config> {
        let vars: HashMap<String, String> = pairs.iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn remote_backend_wins_over_database() {
        let config = config_of(&[
            ("SIAGA_BACKEND_URL", "http://siaga.local/"),
            ("DATABASE_URL", "postgres://localhost/siaga"),
        ]).unwrap();

        assert_eq!(config.backend, BackendTarget::Remote("http://siaga.local".into()));
        assert_eq!(config.session_ttl, Duration::new(DEFAULT_SESSION_TTL, 0));
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn missing_backend_is_an_error() {
        assert!(matches!(config_of(&[]), Err(SiagaError::Config(_))));
    }

    #[test]
    fn invalid_number_is_an_error() {
        let result = config_of(&[
            ("DATABASE_URL", "postgres://localhost/siaga"),
            ("SIAGA_WORKERS", "many"),
        ]);
        assert!(matches!(result, Err(SiagaError::Config(_))));
    }
}
