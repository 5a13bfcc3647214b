// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    /// Narrative-augmentation collaborator. All optional: when unset the
    /// submit path skips augmentation entirely.
    pub insight_api_key: Option<String>,
    pub insight_model: String,
    pub insight_api_base: String,
    /// Hard ceiling on the augmentation call, in seconds.
    pub insight_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let insight_api_key = env::var("INSIGHT_API_KEY").ok();

        let insight_model =
            env::var("INSIGHT_MODEL").unwrap_or_else(|_| "gemini-1.5-flash-002".to_string());

        let insight_api_base = env::var("INSIGHT_API_BASE")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());

        let insight_timeout_secs = env::var("INSIGHT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8);

        Self {
            database_url,
            jwt_secret,
            rust_log,
            insight_api_key,
            insight_model,
            insight_api_base,
            insight_timeout_secs,
        }
    }
}
