// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, route guard, security headers).

pub mod auth;
pub mod guard;
pub mod security;

pub use auth::require_session;
pub use guard::route_guard;
