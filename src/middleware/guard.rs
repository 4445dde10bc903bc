// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Page route guard.
//!
//! Only the presence of the session cookie is checked here; handlers that
//! need an identity verify the cookie themselves.

use crate::middleware::auth::SESSION_COOKIE;
use crate::models::puzzle::is_image_file;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

/// Page prefixes that require a session cookie.
pub const PROTECTED_PREFIXES: &[&str] = &[
    "/account",
    "/puzzles",
    "/category",
    "/play",
    "/slide-puzzle",
    "/move-puzzle",
    "/dashboard",
    "/super-admin",
];

/// Pages a signed-in visitor is bounced away from.
pub const AUTH_PAGES: &[&str] = &["/login", "/signup"];

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/puzzles";

const EXCLUDED_FILES: &[&str] = &["/favicon.ico", "/robots.txt", "/sitemap.xml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect(&'static str),
}

/// Segment-aware prefix match: `/play` matches `/play` and `/play/x`, not `/playground`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// API calls, framework assets, well-known files and puzzle images.
pub fn is_excluded(path: &str) -> bool {
    if matches_prefix(path, "/api") || matches_prefix(path, "/_next") {
        return true;
    }
    if EXCLUDED_FILES.contains(&path) {
        return true;
    }
    path.strip_prefix("/puzzles/")
        .is_some_and(|rest| !rest.is_empty() && is_image_file(rest))
}

pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|p| matches_prefix(path, p))
}

pub fn is_auth_page(path: &str) -> bool {
    AUTH_PAGES.iter().any(|p| matches_prefix(path, p))
}

/// Decide what to do with a page request.
pub fn guard_decision(path: &str, has_session_cookie: bool) -> GuardDecision {
    if is_excluded(path) {
        return GuardDecision::Pass;
    }
    if !has_session_cookie && is_protected(path) {
        return GuardDecision::Redirect(LOGIN_PATH);
    }
    if has_session_cookie && is_auth_page(path) {
        return GuardDecision::Redirect(HOME_PATH);
    }
    GuardDecision::Pass
}

/// Middleware applying [`guard_decision`] to every request.
pub async fn route_guard(jar: CookieJar, request: Request, next: Next) -> Response {
    let has_cookie = jar
        .get(SESSION_COOKIE)
        .is_some_and(|c| !c.value().is_empty());

    match guard_decision(request.uri().path(), has_cookie) {
        GuardDecision::Pass => next.run(request).await,
        GuardDecision::Redirect(to) => {
            tracing::debug!(path = %request.uri().path(), to, "Route guard redirect");
            Redirect::temporary(to).into_response()
        }
    }
}
