//! Service-account OAuth2 — the JWT-bearer grant.
//!
//! A single authenticator is shared by the Vision and Sheets clients. It
//! signs an RS256 assertion with the service-account private key, exchanges
//! it at the token endpoint, and caches the access token until shortly
//! before expiry.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ServiceAccountKey;
use crate::error::AuthError;

/// Scopes the relay needs: spreadsheet writes and the Vision API.
const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/cloud-platform";

/// Assertion lifetime requested from the token endpoint.
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the token actually expires.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    /// Unix timestamp past which the token must not be reused.
    expires_at: i64,
}

/// Shared, token-caching authenticator.
#[derive(Clone)]
pub struct GoogleAuthenticator {
    key: Arc<ServiceAccountKey>,
    client: reqwest::Client,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl GoogleAuthenticator {
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Self {
        Self {
            key: Arc::new(key),
            client,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Return a valid bearer token, exchanging a fresh assertion if the
    /// cached one is missing or about to expire.
    pub async fn bearer_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_SLACK_SECS > now {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.exchange(now).await?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + token.expires_in,
        });
        debug!(expires_in = token.expires_in, "Refreshed Google access token");
        Ok(access_token)
    }

    async fn exchange(&self, now: i64) -> Result<TokenResponse, AuthError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let encoding_key = EncodingKey::from_rsa_pem(
            self.key.private_key.expose_secret().as_bytes(),
        )
        .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))
    }
}
