use std::path::PathBuf;

use anyhow::Result;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub production: bool,
    pub chat_api_key: String,
    pub chat_api_secret: String,
    pub chat_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("TANDEM_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            anyhow::bail!(
                "TANDEM_JWT_SECRET is unset or still a placeholder. \
                 Set it in your .env file and restart."
            );
        }

        let chat_api_secret = std::env::var("TANDEM_CHAT_API_SECRET").unwrap_or_default();
        if chat_api_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&chat_api_secret.as_str()) {
            anyhow::bail!(
                "TANDEM_CHAT_API_SECRET is unset or still a placeholder. \
                 It must match your chat provider dashboard."
            );
        }

        let db_path: PathBuf = std::env::var("TANDEM_DB_PATH")
            .unwrap_or_else(|_| "tandem.db".into())
            .into();
        let host = std::env::var("TANDEM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("TANDEM_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;
        let cors_origin = std::env::var("TANDEM_CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".into());
        let production = std::env::var("TANDEM_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);

        let chat_api_key = std::env::var("TANDEM_CHAT_API_KEY").unwrap_or_default();
        let chat_base_url = std::env::var("TANDEM_CHAT_BASE_URL")
            .unwrap_or_else(|_| "https://chat-api.example.com".into());

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            cors_origin,
            production,
            chat_api_key,
            chat_api_secret,
            chat_base_url,
        })
    }
}
