// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session sign-in/sign-out and the superadmin bootstrap endpoint.

use crate::error::{AppError, Result};
use crate::middleware::auth::{removal_cookie, session_cookie};
use crate::models::SessionUser;
use crate::routes::{StatusResponse, ValidatedJson};
use crate::AppState;
use axum::{
    extract::State,
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Session create/destroy (no session required).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/auth/session",
        post(create_session).delete(destroy_session),
    )
}

/// Routes that need a verified session; the caller applies the middleware.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/set-admin", post(set_admin))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 8192))]
    pub id_token: String,
}

/// Exchange a Firebase ID token for a session cookie.
async fn create_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<CreateSessionRequest>,
) -> Result<(CookieJar, Json<StatusResponse>)> {
    let id_token = body.id_token.trim();
    if id_token.is_empty() {
        return Err(AppError::BadRequest("ID token is required".to_string()));
    }

    let cookie = state.auth.create_session_cookie(id_token).await.map_err(|e| {
        tracing::warn!(error = %e, "Session cookie creation failed");
        AppError::from(e)
    })?;

    tracing::info!("Session created");
    Ok((jar.add(session_cookie(cookie)), Json(StatusResponse::success())))
}

/// Clear the session cookie. Always succeeds.
async fn destroy_session(jar: CookieJar) -> (CookieJar, Json<StatusResponse>) {
    (jar.add(removal_cookie()), Json(StatusResponse::success()))
}

/// Grant the superadmin claim to the configured administrator account.
async fn set_admin(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<StatusResponse>> {
    if !is_configured_superadmin(&user, state.config.superadmin_email.as_deref()) {
        tracing::warn!(uid = %user.uid, "Rejected superadmin claim request");
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    let identity = state.auth.identity();
    let account = identity.lookup_account(&user.uid).await?;

    // Merge so that claims set by other tooling survive
    let mut claims = account.custom_claims()?.without_reserved();
    claims.superadmin = Some(true);
    identity.set_custom_claims(&user.uid, &claims).await?;

    tracing::info!(uid = %user.uid, "Superadmin claim granted");
    Ok(Json(StatusResponse::with_message(
        "Superadmin claim set. Sign in again to refresh your session.",
    )))
}

/// Verified email equal (ignoring case) to the configured superadmin email.
fn is_configured_superadmin(user: &SessionUser, superadmin_email: Option<&str>) -> bool {
    let Some(expected) = superadmin_email.map(str::trim).filter(|e| !e.is_empty()) else {
        return false;
    };
    user.email_verified
        && user
            .email
            .as_deref()
            .is_some_and(|email| email.trim().eq_ignore_ascii_case(expected))
}
