use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::AppError;

const INDEXING_SCOPE: &str = "https://www.googleapis.com/auth/indexing";
const ASSERTION_TTL_SECS: i64 = 3600;

/// Google-style service-account key, the fields the token exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
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
    token: String,
    expires_at: DateTime<Utc>,
}

enum Auth {
    /// Fixed bearer token, no exchange (dev/test override).
    Static(String),
    /// RS256 service-account assertion exchanged at `token_uri`.
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Response from the notification endpoint, body bounded for storage.
#[derive(Debug)]
pub struct PublishOutcome {
    pub status: u16,
    pub body: String,
}

/// A request that never produced a response. `status` is set when the
/// transport error carries one (e.g. a 429 surfaced as an error).
#[derive(Debug)]
pub struct PublishError {
    pub message: String,
    pub status: Option<u16>,
}

/// Authenticated client for the URL notification API.
pub struct IndexingClient {
    client: reqwest::Client,
    endpoint_url: String,
    auth: Auth,
}

impl IndexingClient {
    /// Build from config. Returns `None` when no credential is configured;
    /// dispatch then refuses to run rather than claiming anything.
    pub fn from_config(config: &Config) -> Result<Option<Self>, String> {
        let auth = if let Some(token) = &config.access_token {
            Auth::Static(token.clone())
        } else if let Some(path) = &config.service_account_file {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read service account file {path}: {e}"))?;
            let key: ServiceAccountKey = serde_json::from_str(&raw)
                .map_err(|e| format!("Invalid service account JSON in {path}: {e}"))?;
            Auth::ServiceAccount {
                key,
                cached: Mutex::new(None),
            }
        } else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Some(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            auth,
        }))
    }

    /// Validate the credential and warm the token cache. Called before any
    /// items are claimed, so a bad credential aborts the run cleanly.
    pub async fn ensure_token(&self) -> Result<(), AppError> {
        self.token().await.map(|_| ())
    }

    async fn token(&self) -> Result<String, AppError> {
        match &self.auth {
            Auth::Static(token) => Ok(token.clone()),
            Auth::ServiceAccount { key, cached } => {
                let mut guard = cached.lock().await;
                if let Some(t) = guard.as_ref() {
                    if t.expires_at > Utc::now() + Duration::seconds(60) {
                        return Ok(t.token.clone());
                    }
                }
                let fresh = self.exchange(key).await?;
                let token = fresh.token.clone();
                *guard = Some(fresh);
                Ok(token)
            }
        }
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<CachedToken, AppError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: INDEXING_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AppError::Upstream(format!("Invalid service account key: {e}")))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| AppError::Upstream(format!("Failed to sign assertion: {e}")))?;

        let resp = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token exchange failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Token exchange returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid token response: {e}")))?;

        Ok(CachedToken {
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            token: token.access_token,
        })
    }

    /// Announce one URL. The caller branches on the returned status; a
    /// transport error that carries a 429 keeps that status visible.
    pub async fn publish(&self, url: &str) -> Result<PublishOutcome, PublishError> {
        let token = self.token().await.map_err(|e| PublishError {
            message: e.to_string(),
            status: None,
        })?;

        let resp = self
            .client
            .post(&self.endpoint_url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "url": url, "type": "URL_UPDATED" }))
            .send()
            .await
            .map_err(|e| PublishError {
                status: e.status().map(|s| s.as_u16()),
                message: format!("Notification request failed: {e}"),
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(1024)
            .collect::<String>();

        Ok(PublishOutcome { status, body })
    }
}
