//! Client for the hosted chat/video provider.
//!
//! The application consumes the provider through exactly two operations:
//! upserting a remote profile for a local account, and minting a scoped
//! access token the browser client presents to the provider directly.

use anyhow::{Context, Result};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifetime of a minted call/chat access token.
const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Lifetime of the server-scope token used to authenticate our own calls
/// to the provider API.
const SERVER_TOKEN_TTL_SECS: i64 = 5 * 60;

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

/// Claims of a user-scoped access token, verified by the provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: String,
    pub exp: usize,
}

#[derive(Debug, Serialize)]
struct ServerClaims {
    server: bool,
    exp: usize,
}

#[derive(Debug, Serialize)]
struct UpsertUserBody<'a> {
    id: &'a str,
    name: &'a str,
    image: &'a str,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Create or update the provider-side profile for a local account.
    /// Callers treat the provider as a non-authoritative cache, so failures
    /// here are theirs to log and move past.
    pub async fn upsert_user(&self, id: &str, name: &str, image: &str) -> Result<()> {
        let url = format!("{}/users/{}", self.base_url.trim_end_matches('/'), id);
        let body = UpsertUserBody { id, name, image };

        self.http
            .put(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .bearer_auth(self.server_token()?)
            .json(&body)
            .send()
            .await
            .context("chat provider unreachable")?
            .error_for_status()
            .context("chat provider rejected profile upsert")?;

        debug!("Synced profile {} to chat provider", id);
        Ok(())
    }

    /// Mint a short-lived, user-scoped access token. Signing happens
    /// locally with the provider API secret; no network round trip.
    pub fn mint_token(&self, user_id: &str) -> Result<String> {
        let claims = AccessClaims {
            user_id: user_id.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::seconds(ACCESS_TOKEN_TTL_SECS)).timestamp()
                as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn server_token(&self) -> Result<String> {
        let claims = ServerClaims {
            server: true,
            exp: (chrono::Utc::now() + chrono::Duration::seconds(SERVER_TOKEN_TTL_SECS)).timestamp()
                as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    #[test]
    fn minted_token_is_scoped_to_the_user() {
        let client = ChatClient::new("https://chat.example.com", "key", "secret");
        let token = client.mint_token("user-123").unwrap();

        let data = decode::<AccessClaims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.user_id, "user-123");
        assert!(data.claims.exp > chrono::Utc::now().timestamp() as usize);
    }

    #[test]
    fn minted_token_fails_verification_with_wrong_secret() {
        let client = ChatClient::new("https://chat.example.com", "key", "secret");
        let token = client.mint_token("user-123").unwrap();

        let result = decode::<AccessClaims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
