//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::util::rate_limit::INPUT_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,

    /// Allowed client origins for CORS, comma-separated; `*` allows any
    pub client_origin: String,
    /// Inbound WebSocket messages allowed per connection per second
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        let input_rate_limit = match lookup("INPUT_RATE_LIMIT") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber("INPUT_RATE_LIMIT"))?,
            None => INPUT_RATE_LIMIT,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            supabase_url: lookup("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
            supabase_service_role_key: lookup("SUPABASE_SERVICE_ROLE_KEY")
                .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,

            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            input_rate_limit,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid positive integer in environment variable: {0}")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("SUPABASE_URL", "https://db.example.test"),
        ("SUPABASE_SERVICE_ROLE_KEY", "service-key"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config = assert_ok!(Config::from_lookup(lookup(&REQUIRED)));
        assert_eq!(config.server_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.client_origin, "*");
        assert_eq!(config.input_rate_limit, 30);
    }

    #[test]
    fn port_takes_precedence_over_server_addr() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "9000"));
        vars.push(("SERVER_ADDR", "127.0.0.1:4000"));
        let config = assert_ok!(Config::from_lookup(lookup(&vars)));
        assert_eq!(config.server_addr.to_string(), "0.0.0.0:9000");
    }

    #[test]
    fn missing_supabase_url_is_reported() {
        let err = assert_err!(Config::from_lookup(lookup(&REQUIRED[1..])));
        assert!(matches!(err, ConfigError::Missing("SUPABASE_URL")));
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("SERVER_ADDR", "not-an-address"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::InvalidAddress)
        ));

        let mut vars = REQUIRED.to_vec();
        vars.push(("INPUT_RATE_LIMIT", "0"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::InvalidNumber("INPUT_RATE_LIMIT"))
        ));
    }
}
