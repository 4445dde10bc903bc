// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Playzzle API Server
//!
//! Serves sessions, entitlements, Razorpay checkout and the puzzle pages.

use playzzle::{
    config::Config,
    db::FirestoreDb,
    services::{CatalogService, FirebaseAuth, RazorpayClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Playzzle API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.firebase_project_id).await?;

    // Identity provider handle, shared process-wide
    let auth = FirebaseAuth::global(&config)?;

    // Load puzzle catalog
    let puzzles_dir = config.puzzles_dir();
    tracing::info!(path = %puzzles_dir.display(), "Loading puzzle catalog");
    let catalog = CatalogService::load_from_dir(&puzzles_dir)?;

    if config.razorpay_credentials().is_none() {
        tracing::warn!("Razorpay credentials not set, checkout will be unavailable");
    }
    let razorpay = RazorpayClient::new()?;

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth,
        razorpay,
        catalog,
    });

    // Build router
    let app = playzzle::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("playzzle=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
