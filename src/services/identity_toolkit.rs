// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity Toolkit (Firebase Auth) admin REST client.
//!
//! Handles:
//! - Service account OAuth access tokens (JWT bearer grant, cached)
//! - Session cookie creation from client ID tokens
//! - Account lookup (revocation checks, current claims)
//! - Custom claim updates

use crate::config::ServiceAccount;
use crate::models::CustomClaims;
use anyhow::Context;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const OAUTH_SCOPES: &str =
    "https://www.googleapis.com/auth/cloud-platform https://www.googleapis.com/auth/identitytoolkit";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const ASSERTION_LIFETIME_SECS: u64 = 3600;
/// Refresh access tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Provider error codes that mean the caller's ID token is no good.
const INVALID_TOKEN_CODES: &[&str] = &[
    "INVALID_ID_TOKEN",
    "TOKEN_EXPIRED",
    "USER_NOT_FOUND",
    "USER_DISABLED",
    "CREDENTIAL_TOO_OLD_LOGIN_AGAIN",
];

/// Errors from the Identity Toolkit API.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Identity token rejected: {0}")]
    InvalidIdToken(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Identity provider credentials are not configured")]
    NotConfigured,

    #[error("Identity provider request failed: {0}")]
    Upstream(String),
}

/// Account fields the application cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    /// Seconds since epoch; sessions authenticated before this are revoked.
    #[serde(default)]
    pub valid_since: Option<String>,
    /// JSON-encoded custom claims.
    #[serde(default)]
    pub custom_attributes: Option<String>,
}

impl AccountRecord {
    pub fn valid_since_secs(&self) -> Option<u64> {
        self.valid_since.as_deref().and_then(|v| v.parse().ok())
    }

    /// Decoded custom claims; an absent or blank attribute is no claims.
    /// Claims that do not decode are an error, never empty.
    pub fn custom_claims(&self) -> Result<CustomClaims, IdentityError> {
        match self
            .custom_attributes
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
        {
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                IdentityError::Upstream(format!(
                    "undecodable custom claims for {}: {e}",
                    self.local_id
                ))
            }),
            None => Ok(CustomClaims::default()),
        }
    }
}

#[derive(Clone)]
struct CachedAccessToken {
    token: String,
    expires_at: Instant,
}

/// Identity Toolkit admin client.
pub struct IdentityToolkitClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    project_id: String,
    credentials: Option<ServiceAccount>,
    token_cache: RwLock<Option<CachedAccessToken>>,
    refresh_lock: Mutex<()>,
}

impl IdentityToolkitClient {
    /// Create a client against the production endpoints.
    pub fn new(project_id: &str, credentials: Option<ServiceAccount>) -> anyhow::Result<Self> {
        Self::with_endpoints(project_id, credentials, DEFAULT_BASE_URL, DEFAULT_TOKEN_URL)
    }

    /// Create a client against custom endpoints (local fakes in tests).
    pub fn with_endpoints(
        project_id: &str,
        credentials: Option<ServiceAccount>,
        base_url: &str,
        token_url: &str,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building Identity Toolkit HTTP client")?;

        if credentials.is_none() {
            tracing::warn!("No service account configured; session creation and claim updates will fail");
        }

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            project_id: project_id.to_string(),
            credentials,
            token_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Exchange a client ID token for a session cookie valid for `valid_for`.
    pub async fn create_session_cookie(
        &self,
        id_token: &str,
        valid_for: Duration,
    ) -> Result<String, IdentityError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Request<'a> {
            id_token: &'a str,
            valid_duration: String,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            session_cookie: String,
        }

        let url = format!(
            "{}/projects/{}:createSessionCookie",
            self.base_url, self.project_id
        );
        let body = Request {
            id_token,
            valid_duration: valid_for.as_secs().to_string(),
        };

        let response: Response = self.post_json(&url, &body).await?;
        Ok(response.session_cookie)
    }

    /// Look up one account by UID.
    pub async fn lookup_account(&self, uid: &str) -> Result<AccountRecord, IdentityError> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            users: Vec<AccountRecord>,
        }

        let url = format!(
            "{}/projects/{}/accounts:lookup",
            self.base_url, self.project_id
        );
        let body = serde_json::json!({ "localId": [uid] });

        let response: Response = self.post_json(&url, &body).await?;
        response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::UserNotFound(uid.to_string()))
    }

    /// Replace an account's custom claims.
    pub async fn set_custom_claims(
        &self,
        uid: &str,
        claims: &CustomClaims,
    ) -> Result<(), IdentityError> {
        let encoded = serde_json::to_string(claims)
            .map_err(|e| IdentityError::Upstream(format!("failed encoding claims: {e}")))?;

        let url = format!(
            "{}/projects/{}/accounts:update",
            self.base_url, self.project_id
        );
        let body = serde_json::json!({
            "localId": uid,
            "customAttributes": encoded,
        });

        let _: serde_json::Value = self.post_json(&url, &body).await?;
        tracing::info!(uid, "Custom claims updated");
        Ok(())
    }

    /// Authenticated POST with JSON in and out.
    async fn post_json<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, IdentityError> {
        let access_token = self.access_token().await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| IdentityError::Upstream(format!("invalid response JSON: {e}")));
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let code = provider_error_code(&body);

        if status.is_client_error() {
            if let Some(code) = code.as_deref() {
                if INVALID_TOKEN_CODES.iter().any(|c| code.starts_with(c)) {
                    return Err(IdentityError::InvalidIdToken(code.to_string()));
                }
            }
        }

        Err(IdentityError::Upstream(format!("HTTP {}: {}", status, body)))
    }

    /// Get a cached OAuth access token, minting a new one when close to expiry.
    async fn access_token(&self) -> Result<String, IdentityError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let credentials = self
            .credentials
            .as_ref()
            .ok_or(IdentityError::NotConfigured)?;

        let assertion = self.sign_assertion(credentials)?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default = "default_expires_in")]
            expires_in: u64,
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Upstream(format!(
                "token request returned HTTP {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("invalid token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *self.token_cache.write().await = Some(CachedAccessToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        tracing::debug!(expires_in = token.expires_in, "Service account access token refreshed");
        Ok(token.access_token)
    }

    async fn cached_token(&self) -> Option<String> {
        let cache = self.token_cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.token.clone())
    }

    fn sign_assertion(&self, credentials: &ServiceAccount) -> Result<String, IdentityError> {
        #[derive(Serialize)]
        struct AssertionClaims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: u64,
            exp: u64,
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| IdentityError::Upstream(format!("system time error: {e}")))?
            .as_secs();

        let claims = AssertionClaims {
            iss: &credentials.client_email,
            scope: OAUTH_SCOPES,
            aud: &self.token_url,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| IdentityError::Upstream(format!("invalid service account key: {e}")))?;

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| IdentityError::Upstream(format!("failed signing assertion: {e}")))
    }
}

fn default_expires_in() -> u64 {
    3600
}

/// Extract `error.message` from a Google API error body.
fn provider_error_code(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.split_whitespace().next().unwrap_or(s).to_string())
}
