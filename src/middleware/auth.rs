// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie authentication middleware.

use crate::error::AppError;
use crate::services::entitlements::verify_session;
use crate::services::firebase_auth::SESSION_DURATION;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

/// Name of the session cookie. Firebase Hosting only forwards this one.
pub const SESSION_COOKIE: &str = "__session";

/// Middleware that requires a verified session cookie.
///
/// On success the [`SessionUser`](crate::models::SessionUser) is inserted
/// as a request extension.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value());

    let user = verify_session(&state.auth, cookie)
        .await
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// The raw session cookie value, if the request carries a non-empty one.
pub fn session_cookie_value(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
}

/// Build the session cookie set after sign-in.
pub fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .secure(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_DURATION.as_secs() as i64))
        .build()
}

/// Build a cookie that clears the session on the client.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .secure(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}
