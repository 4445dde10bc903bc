// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the puzzle catalog and signed-in users.

use crate::db::firestore::UnlockOutcome;
use crate::error::{AppError, Result};
use crate::models::{Entitlements, PuzzleId, PuzzleSummary, SessionUser};
use crate::pagination::{page_window, paginate, Page, PageLink, DEFAULT_PER_PAGE, PAGER_RADIUS};
use crate::routes::ValidatedJson;
use crate::services::entitlements::load_entitlements;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Public API routes.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/puzzles", get(list_puzzles))
}

/// API routes (require a session).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/wishlist/toggle", post(toggle_wishlist))
        .route("/api/puzzles/unlock", post(unlock_puzzle))
}

// ─── User Profile ────────────────────────────────────────────

/// Get the current user's entitlements.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Entitlements>> {
    Ok(Json(load_entitlements(&state.db, &user).await?))
}

// ─── Catalog ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PuzzleListParams {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// A page of puzzles plus what the listing UI needs around it.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleListResponse {
    #[serde(flatten)]
    pub page: Page<PuzzleSummary>,
    pub categories: Vec<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<number | string>"))]
    pub pager: Vec<PageLink>,
}

/// Search and paginate the catalog.
async fn list_puzzles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PuzzleListParams>,
) -> Json<PuzzleListResponse> {
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let query = params.q.as_deref().unwrap_or_default();
    let mode = state.config.puzzle_name_display;

    let matches: Vec<PuzzleSummary> = state
        .catalog
        .search(category, query)
        .into_iter()
        .map(|p| PuzzleSummary::from_puzzle(p, mode))
        .collect();

    let page = paginate(
        &matches,
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(DEFAULT_PER_PAGE),
    );
    let pager = page_window(page.page, page.total_pages, PAGER_RADIUS);

    Json(PuzzleListResponse {
        page,
        categories: state.catalog.categories().map(str::to_string).collect(),
        pager,
    })
}

// ─── Wishlist ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleRequest {
    #[validate(length(min = 3, max = 512))]
    pub puzzle_id: String,
}

impl PuzzleRequest {
    fn puzzle_id(&self) -> Result<PuzzleId> {
        self.puzzle_id
            .trim()
            .parse::<PuzzleId>()
            .map_err(|e| AppError::BadRequest(e.to_string()))
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct WishlistResponse {
    pub wishlist: Vec<String>,
    pub added: bool,
}

/// Add a puzzle to the wishlist, or remove it if already there.
async fn toggle_wishlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    ValidatedJson(body): ValidatedJson<PuzzleRequest>,
) -> Result<Json<WishlistResponse>> {
    let puzzle_id = body.puzzle_id()?;
    if state.catalog.get(&puzzle_id).is_none() {
        return Err(AppError::NotFound(format!("Puzzle {} not found", puzzle_id)));
    }

    let wishlist = state.db.toggle_wishlist(&user.uid, &puzzle_id).await?;
    let id = puzzle_id.to_string();
    let added = wishlist.items.contains(&id);

    Ok(Json(WishlistResponse {
        wishlist: wishlist.items,
        added,
    }))
}

// ─── Credit Unlock ───────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    pub status: String,
    pub puzzle_id: String,
    pub credit_spent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Spend one puzzle credit on a pro puzzle.
async fn unlock_puzzle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    ValidatedJson(body): ValidatedJson<PuzzleRequest>,
) -> Result<Json<UnlockResponse>> {
    let puzzle_id = body.puzzle_id()?;
    if state.catalog.get(&puzzle_id).is_none() {
        return Err(AppError::NotFound(format!("Puzzle {} not found", puzzle_id)));
    }

    let entitlements = load_entitlements(&state.db, &user).await?;
    if entitlements.can_access(&puzzle_id) {
        return Ok(Json(UnlockResponse {
            status: "success".to_string(),
            puzzle_id: puzzle_id.to_string(),
            credit_spent: false,
            transaction_id: None,
        }));
    }

    let (credit_spent, transaction_id) =
        match state.db.consume_credit_atomic(&user.uid, &puzzle_id).await? {
            UnlockOutcome::Unlocked { transaction_id } => (true, Some(transaction_id)),
            UnlockOutcome::AlreadyUnlocked => (false, None),
            UnlockOutcome::NoCredits => {
                return Err(AppError::BadRequest(
                    "No puzzle credits available".to_string(),
                ))
            }
        };

    Ok(Json(UnlockResponse {
        status: "success".to_string(),
        puzzle_id: puzzle_id.to_string(),
        credit_spent,
        transaction_id,
    }))
}
