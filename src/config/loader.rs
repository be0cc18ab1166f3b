//! Load configuration from environment variables, falling back to defaults for unset ones.

use crate::config::{validate, TenancyConfig};
use crate::error::ConfigError;
use crate::middleware::cors::MAX_MAX_AGE;
use crate::resolver::parse_order;
use crate::tenant::normalize;
use std::time::Duration;

impl TenancyConfig {
    /// Read `DATABASE_URL`, `REDIS_URL`, `DB_MAIN_SCHEMA`, `TENANT_*`, `CORS_*` and `APP_*`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TenancyConfig::from_env`] with a custom variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = TenancyConfig::default();

        let resolve_order = match var("TENANT_RESOLVE_ORDER") {
            Some(raw) => {
                let order = parse_order(&raw)?;
                if order.is_empty() {
                    defaults.resolve_order
                } else {
                    order
                }
            }
            None => defaults.resolve_order,
        };

        let config = TenancyConfig {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            redis_url: var("REDIS_URL"),
            main_schema: var("DB_MAIN_SCHEMA").map(|s| normalize(&s)).unwrap_or(defaults.main_schema),
            tenant_header: var("TENANT_HEADER").unwrap_or(defaults.tenant_header),
            resolve_order,
            cache_ttl: duration_var("TENANT_CACHE_TTL", var("TENANT_CACHE_TTL"), defaults.cache_ttl)?,
            cache_key_prefix: var("TENANT_CACHE_KEY_PREFIX").unwrap_or(defaults.cache_key_prefix),
            cors_ttl: duration_var("CORS_CACHE_TTL", var("CORS_CACHE_TTL"), defaults.cors_ttl)?,
            cors_max_age: duration_var("CORS_MAX_AGE", var("CORS_MAX_AGE"), defaults.cors_max_age)?
                .min(MAX_MAX_AGE),
            address: var("APP_ADDRESS").unwrap_or(defaults.address),
            request_timeout: duration_var("APP_REQUEST_TIMEOUT", var("APP_REQUEST_TIMEOUT"), defaults.request_timeout)?,
        };
        validate(&config)?;
        Ok(config)
    }
}

fn duration_var(name: &'static str, value: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(raw) => parse_duration(&raw).map_err(|reason| ConfigError::Invalid { var: name, reason }),
        None => Ok(default),
    }
}

/// `<n>` (seconds), `<n>s`, `<n>m` or `<n>h`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => raw.split_at(i),
        None => (raw, "s"),
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("{:?} is not a duration (expected e.g. 30s, 3m, 1h)", raw))?;
    let secs = match unit.trim() {
        "s" => Some(n),
        "m" => n.checked_mul(60),
        "h" => n.checked_mul(3600),
        other => return Err(format!("unknown duration unit {:?} in {:?}", other, raw)),
    };
    secs.map(Duration::from_secs)
        .ok_or_else(|| format!("{:?} is out of range", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StrategyKind;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<TenancyConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        TenancyConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(load(&[]).unwrap(), TenancyConfig::default());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DB_MAIN_SCHEMA", " Core "),
            ("REDIS_URL", "redis://127.0.0.1/"),
            ("TENANT_RESOLVE_ORDER", "domain,header"),
            ("TENANT_CACHE_TTL", "10m"),
            ("CORS_MAX_AGE", "3600"),
            ("APP_REQUEST_TIMEOUT", "   "),
        ])
        .unwrap();
        assert_eq!(config.main_schema, "core");
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.resolve_order, vec![StrategyKind::Domain, StrategyKind::Header]);
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.cors_max_age, Duration::from_secs(600));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        match load(&[("TENANT_CACHE_TTL", "soon")]) {
            Err(ConfigError::Invalid { var, .. }) => assert_eq!(var, "TENANT_CACHE_TTL"),
            other => panic!("unexpected: {:?}", other),
        }
        match load(&[("DB_MAIN_SCHEMA", "main-db")]) {
            Err(ConfigError::Invalid { var, .. }) => assert_eq!(var, "DB_MAIN_SCHEMA"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            load(&[("TENANT_RESOLVE_ORDER", "header,cookie")]),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }
}
