//! Config validation: identifiers, header names, addresses and durations.

use crate::config::TenancyConfig;
use crate::error::ConfigError;
use crate::tenant::is_safe_ident;
use axum::http::HeaderName;
use std::net::SocketAddr;

pub fn validate(config: &TenancyConfig) -> Result<(), ConfigError> {
    if !is_safe_ident(&config.main_schema) {
        return Err(invalid("DB_MAIN_SCHEMA", format!("{:?} is not a valid schema name", config.main_schema)));
    }
    HeaderName::from_bytes(config.tenant_header.as_bytes())
        .map_err(|e| invalid("TENANT_HEADER", e.to_string()))?;
    config
        .address
        .parse::<SocketAddr>()
        .map_err(|e| invalid("APP_ADDRESS", e.to_string()))?;

    let positive = [
        ("TENANT_CACHE_TTL", config.cache_ttl),
        ("CORS_CACHE_TTL", config.cors_ttl),
        ("APP_REQUEST_TIMEOUT", config.request_timeout),
    ];
    for (var, d) in positive {
        if d.is_zero() {
            return Err(invalid(var, "must be greater than zero".into()));
        }
    }
    if config.cache_key_prefix.trim().trim_end_matches(':').is_empty() {
        return Err(invalid("TENANT_CACHE_KEY_PREFIX", "must not be empty".into()));
    }
    if config.database_url.is_empty() {
        return Err(ConfigError::Missing("DATABASE_URL"));
    }
    Ok(())
}

fn invalid(var: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { var, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_is_valid() {
        assert!(validate(&TenancyConfig::default()).is_ok());
    }

    #[test]
    fn test_rejections() {
        let cases: Vec<(&str, TenancyConfig)> = vec![
            ("TENANT_HEADER", TenancyConfig { tenant_header: "X Tenant".into(), ..Default::default() }),
            ("APP_ADDRESS", TenancyConfig { address: "localhost".into(), ..Default::default() }),
            ("CORS_CACHE_TTL", TenancyConfig { cors_ttl: Duration::ZERO, ..Default::default() }),
            ("TENANT_CACHE_KEY_PREFIX", TenancyConfig { cache_key_prefix: " : ".into(), ..Default::default() }),
        ];
        for (expected, config) in cases {
            match validate(&config) {
                Err(ConfigError::Invalid { var, .. }) => assert_eq!(var, expected),
                other => panic!("{}: unexpected {:?}", expected, other),
            }
        }
    }
}
