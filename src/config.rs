//! Configuration module

use std::env;

use validator::Validate;

/// Application configuration
#[derive(Debug, Clone, Validate)]
pub struct Config {
    /// Server port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Model file (native or XGBoost JSON)
    #[validate(length(min = 1))]
    pub model_path: String,

    /// Request body limit in bytes
    #[validate(range(min = 1))]
    pub max_upload_bytes: usize,

    /// Data rows accepted per request
    #[validate(range(min = 1))]
    pub max_rows: usize,

    /// Environment (development, production)
    pub environment: String,

    /// `json` for structured logs, anything else for plain text
    pub log_format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "model.json".to_string()),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(10 * 1024 * 1024),

            max_rows: env::var("MAX_ROWS")
                .ok()
                .and_then(|r| r.parse().ok())
                .unwrap_or(crate::pipeline::DEFAULT_MAX_ROWS),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "text".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            model_path: "model.json".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            max_rows: crate::pipeline::DEFAULT_MAX_ROWS,
            environment: "development".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_production());
        assert!(!config.json_logs());
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let config = Config { max_rows: 0, model_path: String::new(), ..Config::default() };
        let errors = config.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("max_rows"));
        assert!(fields.contains_key("model_path"));
    }

    #[test]
    fn test_log_format() {
        let config = Config { log_format: "JSON".to_string(), ..Config::default() };
        assert!(config.json_logs());
    }
}
