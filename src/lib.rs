// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Playzzle: backend for an image puzzle site.
//!
//! This crate serves the session, entitlement and checkout API, guards the
//! page namespace, and renders the puzzle play page and static pages.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{CatalogService, FirebaseAuth, RazorpayClient};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub auth: Arc<FirebaseAuth>,
    pub razorpay: RazorpayClient,
    pub catalog: CatalogService,
}
