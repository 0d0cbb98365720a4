use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Per-connection statement timeout, guarding against runaway queries
    /// holding a transaction open.
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub max_search_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    /// "cookies" or "bearer"
    pub token_location: String,
    pub csrf_protect: bool,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub csrf_cookie: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment-specific defaults first, then specific env var overrides
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            self.database.acquire_timeout_secs = v.parse().unwrap_or(self.database.acquire_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_STATEMENT_TIMEOUT_MS") {
            self.database.statement_timeout_ms = v.parse().unwrap_or(self.database.statement_timeout_ms);
        }

        // API overrides
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_MAX_SEARCH_LEN") {
            self.api.max_search_len = v.parse().unwrap_or(self.api.max_search_len);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_JWT_SECRET").or_else(|_| env::var("JWT_SECRET")) {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_TOKEN_LOCATION") {
            self.security.token_location = v;
        }
        if let Ok(v) = env::var("SECURITY_CSRF_PROTECT") {
            self.security.csrf_protect = v.parse().unwrap_or(self.security.csrf_protect);
        }
        if let Ok(v) = env::var("SECURITY_ACCESS_TOKEN_EXPIRY_MINS") {
            self.security.access_token_expiry_mins = v.parse().unwrap_or(self.security.access_token_expiry_mins);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_TOKEN_EXPIRY_DAYS") {
            self.security.refresh_token_expiry_days = v.parse().unwrap_or(self.security.refresh_token_expiry_days);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                acquire_timeout_secs: 30,
                statement_timeout_ms: 30_000,
            },
            api: ApiConfig {
                default_page_size: 20,
                max_page_size: 100,
                max_search_len: 64,
            },
            security: SecurityConfig {
                jwt_secret: "dev-secret-change-in-production".to_string(),
                token_location: "cookies".to_string(),
                csrf_protect: true,
                access_token_expiry_mins: 60,
                refresh_token_expiry_days: 30,
                access_cookie: "access_token".to_string(),
                refresh_cookie: "refresh_token".to_string(),
                csrf_cookie: "csrf_token".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                acquire_timeout_secs: 10,
                statement_timeout_ms: 10_000,
            },
            api: ApiConfig {
                default_page_size: 20,
                max_page_size: 100,
                max_search_len: 64,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                token_location: "cookies".to_string(),
                csrf_protect: true,
                access_token_expiry_mins: 30,
                refresh_token_expiry_days: 14,
                access_cookie: "access_token".to_string(),
                refresh_cookie: "refresh_token".to_string(),
                csrf_cookie: "csrf_token".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                acquire_timeout_secs: 5,
                statement_timeout_ms: 5_000,
            },
            api: ApiConfig {
                default_page_size: 20,
                max_page_size: 50,
                max_search_len: 64,
            },
            security: SecurityConfig {
                // Must come from SECURITY_JWT_SECRET; startup fails on empty
                jwt_secret: String::new(),
                token_location: "cookies".to_string(),
                csrf_protect: true,
                access_token_expiry_mins: 15,
                refresh_token_expiry_days: 7,
                access_cookie: "access_token".to_string(),
                refresh_cookie: "refresh_token".to_string(),
                csrf_cookie: "csrf_token".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.api.default_page_size, 20);
        assert!(config.security.csrf_protect);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn production_requires_secret_from_env() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.security.access_token_expiry_mins, 15);
    }
}
