// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use playzzle::config::{Config, ServiceAccount};
use playzzle::db::FirestoreDb;
use playzzle::models::PuzzleId;
use playzzle::routes::create_router;
use playzzle::services::{CatalogService, FirebaseAuth, IdentityToolkitClient, RazorpayClient};
use playzzle::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TEST_PROJECT: &str = "test-project";
pub const TEST_KID: &str = "test-kid";
/// Nothing listens here; calls to it fail fast.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

pub const PRIVATE_KEY: &str = include_str!("../fixtures/test_signing_key.pem");
pub const PUBLIC_KEY: &str = include_str!("../fixtures/test_signing_key.pub.pem");

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new(TEST_PROJECT)
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Puzzles available in every test app.
#[allow(dead_code)]
pub fn test_catalog() -> CatalogService {
    CatalogService::from_ids(
        [
            "animals/dog.jpg",
            "animals/_pro_a-cute-kitty.jpg",
            "animals/parrot.png",
            "nature/mountain-lake.webp",
            "nature/_pro_northern-lights.jpg",
        ]
        .iter()
        .map(|s| s.parse::<PuzzleId>().unwrap()),
    )
}

/// Service account using the fixture key, for fake token endpoints.
#[allow(dead_code)]
pub fn test_service_account() -> ServiceAccount {
    ServiceAccount {
        client_email: "firebase-adminsdk@test-project.iam.gserviceaccount.com".to_string(),
        private_key: PRIVATE_KEY.to_string(),
    }
}

/// External endpoints a test app talks to.
#[allow(dead_code)]
pub struct TestEndpoints {
    pub identity_base: String,
    pub token_url: String,
    pub razorpay_base: String,
    pub credentials: Option<ServiceAccount>,
}

impl Default for TestEndpoints {
    fn default() -> Self {
        Self {
            identity_base: UNREACHABLE.to_string(),
            token_url: format!("{UNREACHABLE}/token"),
            razorpay_base: UNREACHABLE.to_string(),
            credentials: None,
        }
    }
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default(), TestEndpoints::default())
}

/// Create a test app with a custom config and external endpoints.
#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    endpoints: TestEndpoints,
) -> (axum::Router, Arc<AppState>) {
    let identity = IdentityToolkitClient::with_endpoints(
        &config.firebase_project_id,
        endpoints.credentials,
        &endpoints.identity_base,
        &endpoints.token_url,
    )
    .unwrap();

    let auth = FirebaseAuth::new_with_static_key(
        &config,
        identity,
        TEST_KID,
        DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
    )
    .unwrap();

    let state = Arc::new(AppState {
        config,
        db: test_db_offline(),
        auth: Arc::new(auth),
        razorpay: RazorpayClient::with_base_url(&endpoints.razorpay_base).unwrap(),
        catalog: test_catalog(),
    });

    (create_router(state.clone()), state)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Session cookie claims as the identity provider would mint them.
#[allow(dead_code)]
pub fn session_claims(uid: &str, email: &str) -> Value {
    let now = now_secs();
    json!({
        "iss": format!("https://session.firebase.google.com/{TEST_PROJECT}"),
        "aud": TEST_PROJECT,
        "sub": uid,
        "user_id": uid,
        "auth_time": now - 60,
        "iat": now - 60,
        "exp": now + 3600,
        "email": email,
        "email_verified": true,
        "firebase": { "sign_in_provider": "google.com" },
    })
}

/// Sign arbitrary claims with the fixture key.
#[allow(dead_code)]
pub fn sign_claims(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap(),
    )
    .unwrap()
}

/// A valid session cookie value for `uid`.
#[allow(dead_code)]
pub fn session_cookie(uid: &str, email: &str) -> String {
    sign_claims(&session_claims(uid, email), TEST_KID)
}

/// `Cookie` header value carrying a valid session.
#[allow(dead_code)]
pub fn session_cookie_header(uid: &str, email: &str) -> String {
    format!("__session={}", session_cookie(uid, email))
}

/// Serve `router` on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as text.
#[allow(dead_code)]
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
