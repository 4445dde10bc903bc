// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase session cookie verification and the process-wide auth handle.

use crate::config::Config;
use crate::models::{CustomClaims, SessionUser};
use crate::services::identity_toolkit::{IdentityError, IdentityToolkitClient};
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

/// X.509 certificates used to sign session cookies, keyed by `kid`.
const SESSION_CERTS_URL: &str =
    "https://www.googleapis.com/identitytoolkit/v3/relyingparty/publicKeys";
const SESSION_ISSUER_PREFIX: &str = "https://session.firebase.google.com/";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Session cookie lifetime: 5 days.
pub const SESSION_DURATION: Duration = Duration::from_secs(60 * 60 * 24 * 5);

static FIREBASE_AUTH: OnceLock<Arc<FirebaseAuth>> = OnceLock::new();

/// Session verification error categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The cookie is malformed, expired, revoked or otherwise untrusted.
    #[error("invalid session: {0}")]
    Invalid(String),
    /// Key fetch or account lookup failed.
    #[error("session verification unavailable: {0}")]
    Transient(String),
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct KeyCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Identity provider handle: mints session cookies and verifies them.
pub struct FirebaseAuth {
    http_client: reqwest::Client,
    project_id: String,
    expected_issuer: String,
    check_revoked: bool,
    mode: VerifierMode,
    key_cache: RwLock<Option<KeyCacheEntry>>,
    refresh_lock: Mutex<()>,
    identity: IdentityToolkitClient,
}

impl FirebaseAuth {
    /// The process-wide instance, created on first use.
    pub fn global(config: &Config) -> anyhow::Result<Arc<Self>> {
        if let Some(existing) = FIREBASE_AUTH.get() {
            return Ok(existing.clone());
        }

        let identity =
            IdentityToolkitClient::new(&config.firebase_project_id, config.service_account.clone())?;
        let auth = Arc::new(Self::new(config, identity)?);

        Ok(FIREBASE_AUTH.get_or_init(|| auth).clone())
    }

    /// Create a verifier that fetches and caches Google's session cookie keys.
    pub fn new(config: &Config, identity: IdentityToolkitClient) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building session key HTTP client")?;

        tracing::info!(
            project = %config.firebase_project_id,
            check_revoked = config.check_revoked_sessions,
            "Initialized Firebase session verifier"
        );

        Ok(Self::build(config, identity, http_client, VerifierMode::Google))
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        identity: IdentityToolkitClient,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static session key kid must not be empty");
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building session key HTTP client")?;

        Ok(Self::build(
            config,
            identity,
            http_client,
            VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        ))
    }

    fn build(
        config: &Config,
        identity: IdentityToolkitClient,
        http_client: reqwest::Client,
        mode: VerifierMode,
    ) -> Self {
        Self {
            http_client,
            project_id: config.firebase_project_id.clone(),
            expected_issuer: format!("{SESSION_ISSUER_PREFIX}{}", config.firebase_project_id),
            check_revoked: config.check_revoked_sessions,
            mode,
            key_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            identity,
        }
    }

    /// Admin API client sharing this handle's credentials.
    pub fn identity(&self) -> &IdentityToolkitClient {
        &self.identity
    }

    /// Exchange a client ID token for a session cookie.
    pub async fn create_session_cookie(&self, id_token: &str) -> Result<String, IdentityError> {
        self.identity
            .create_session_cookie(id_token, SESSION_DURATION)
            .await
    }

    /// Verify a session cookie and return the identity it carries.
    pub async fn verify_session_cookie(&self, cookie: &str) -> Result<SessionUser, AuthError> {
        if cookie.is_empty() {
            return Err(AuthError::Invalid("empty session cookie".to_string()));
        }

        let header = decode_header(cookie)
            .map_err(|e| AuthError::Invalid(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Invalid(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::Invalid("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.expected_issuer.as_str()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<SessionCookieClaims>(cookie, decoding_key.as_ref(), &validation)
            .map_err(|e| AuthError::Invalid(format!("JWT validation failed: {e}")))?
            .claims;

        validate_times(&claims)?;

        if claims.sub.is_empty() || claims.sub.len() > 128 {
            return Err(AuthError::Invalid("invalid subject".to_string()));
        }

        if self.check_revoked {
            self.check_not_revoked(&claims.sub, claims.auth_time).await?;
        }

        Ok(SessionUser {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified.unwrap_or(false),
            name: claims.name,
            picture: claims.picture,
            claims: claims.custom.without_reserved(),
        })
    }

    async fn check_not_revoked(&self, uid: &str, auth_time: u64) -> Result<(), AuthError> {
        let account = self.identity.lookup_account(uid).await.map_err(|e| match e {
            IdentityError::UserNotFound(_) | IdentityError::InvalidIdToken(_) => {
                AuthError::Invalid(e.to_string())
            }
            other => AuthError::Transient(other.to_string()),
        })?;

        if account.disabled {
            return Err(AuthError::Invalid("user account is disabled".to_string()));
        }

        if account
            .valid_since_secs()
            .is_some_and(|valid_since| auth_time < valid_since)
        {
            return Err(AuthError::Invalid("session has been revoked".to_string()));
        }

        Ok(())
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(AuthError::Invalid(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            VerifierMode::Google => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_keys(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(AuthError::Invalid(format!(
            "JWT kid not found in session keys after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.key_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_keys(&self, force_refresh: bool) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.key_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(url = SESSION_CERTS_URL, "Refreshing session cookie key cache");

        let response = self
            .http_client
            .get(SESSION_CERTS_URL)
            .send()
            .await
            .map_err(|e| AuthError::Transient(format!("key request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Transient(format!(
                "key request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let certs: HashMap<String, String> = response
            .json()
            .await
            .map_err(|e| AuthError::Transient(format!("invalid key JSON: {e}")))?;

        let mut keys_by_kid = HashMap::new();
        for (kid, pem) in certs {
            match DecodingKey::from_rsa_pem(pem.as_bytes()) {
                Ok(key) => {
                    keys_by_kid.insert(kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %kid, "Skipping unusable session key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(AuthError::Transient(
                "key response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.key_cache.write().await = Some(KeyCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Session cookie key cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SessionCookieClaims {
    sub: String,
    #[serde(default)]
    iat: Option<u64>,
    auth_time: u64,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(flatten)]
    custom: CustomClaims,
}

fn validate_times(claims: &SessionCookieClaims) -> Result<(), AuthError> {
    let now = now_unix_secs();

    if claims.auth_time > now + CLOCK_SKEW_SECS {
        return Err(AuthError::Invalid(
            "auth_time claim is in the future".to_string(),
        ));
    }

    if claims.iat.is_some_and(|iat| iat > now + CLOCK_SKEW_SECS) {
        return Err(AuthError::Invalid("iat claim is in the future".to_string()));
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
