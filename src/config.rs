// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. Payment gateway credentials are
//! optional here; the checkout routes fail closed when they are absent.

use crate::models::puzzle::PuzzleNameDisplay;
use std::env;
use std::path::PathBuf;

/// Service account credentials for the identity provider.
#[derive(Clone)]
pub struct ServiceAccount {
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Public site URL, used for CORS and absolute sitemap links
    pub site_url: String,
    /// Server port
    pub port: u16,
    /// Directory holding static assets (puzzle images live under `puzzles/`)
    pub public_dir: PathBuf,
    /// Firebase / GCP project ID
    pub firebase_project_id: String,
    /// How puzzle names are shown on listings and the play page
    pub puzzle_name_display: PuzzleNameDisplay,
    /// Whether session verification also checks for revoked sessions
    pub check_revoked_sessions: bool,
    /// The one account allowed to grant itself the superadmin claim
    pub superadmin_email: Option<String>,

    // --- Secrets ---
    /// Identity provider service account
    pub service_account: Option<ServiceAccount>,
    /// Razorpay key ID
    pub razorpay_key_id: Option<String>,
    /// Razorpay key secret
    pub razorpay_key_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let service_account = match (
            non_empty_var("FIREBASE_CLIENT_EMAIL"),
            non_empty_var("FIREBASE_PRIVATE_KEY"),
        ) {
            (Some(client_email), Some(private_key)) => Some(ServiceAccount {
                client_email,
                private_key: unescape_private_key(&private_key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("FIREBASE_PRIVATE_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("FIREBASE_CLIENT_EMAIL")),
        };

        let puzzle_name_display = match non_empty_var("PUZZLE_NAME_DISPLAY") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("PUZZLE_NAME_DISPLAY", raw))?,
            None => PuzzleNameDisplay::default(),
        };

        Ok(Self {
            site_url: env::var("SITE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            public_dir: env::var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            firebase_project_id: non_empty_var("FIREBASE_PROJECT_ID")
                .ok_or(ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
            puzzle_name_display,
            check_revoked_sessions: env::var("SESSION_CHECK_REVOKED")
                .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
                .unwrap_or(true),
            superadmin_email: non_empty_var("SUPERADMIN_EMAIL"),

            service_account,
            razorpay_key_id: non_empty_var("RAZORPAY_KEY_ID"),
            razorpay_key_secret: non_empty_var("RAZORPAY_KEY_SECRET"),
        })
    }

    /// Config for tests only. No network credentials, no revocation lookups.
    pub fn test_default() -> Self {
        Self {
            site_url: "http://localhost:3000".to_string(),
            port: 8080,
            public_dir: PathBuf::from("public"),
            firebase_project_id: "test-project".to_string(),
            puzzle_name_display: PuzzleNameDisplay::Formatted,
            check_revoked_sessions: false,
            superadmin_email: None,
            service_account: None,
            razorpay_key_id: Some("rzp_test_key".to_string()),
            razorpay_key_secret: Some("rzp_test_secret".to_string()),
        }
    }

    /// Directory containing `{category}/{image}` puzzle files.
    pub fn puzzles_dir(&self) -> PathBuf {
        self.public_dir.join("puzzles")
    }

    /// Both Razorpay credentials, or `None` if either is missing.
    pub fn razorpay_credentials(&self) -> Option<(&str, &str)> {
        match (&self.razorpay_key_id, &self.razorpay_key_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Private keys pasted into env files usually carry literal `\n` sequences.
fn unescape_private_key(raw: &str) -> String {
    raw.trim_matches('"').replace("\\n", "\n")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
