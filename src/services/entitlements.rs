// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session to entitlement resolution.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Entitlements, SessionUser};
use crate::services::firebase_auth::{AuthError, FirebaseAuth};

/// Verify a session cookie, treating every failure as "no session".
pub async fn verify_session(auth: &FirebaseAuth, session_cookie: Option<&str>) -> Option<SessionUser> {
    let cookie = session_cookie.filter(|c| !c.is_empty())?;

    match auth.verify_session_cookie(cookie).await {
        Ok(user) => Some(user),
        Err(AuthError::Invalid(reason)) => {
            tracing::debug!(reason = %reason, "Rejected session cookie");
            None
        }
        Err(AuthError::Transient(reason)) => {
            tracing::warn!(reason = %reason, "Session verification failed, treating as anonymous");
            None
        }
    }
}

/// Resolve the current user's entitlements from their session cookie.
///
/// Returns `Ok(None)` for a missing, invalid, expired or revoked session.
/// Once the session is verified, the profile, unlocked puzzles, available
/// credits and wishlist are read concurrently; a database failure there is
/// returned as an error.
pub async fn get_authenticated_user(
    auth: &FirebaseAuth,
    db: &FirestoreDb,
    session_cookie: Option<&str>,
) -> Result<Option<Entitlements>, AppError> {
    let Some(session) = verify_session(auth, session_cookie).await else {
        return Ok(None);
    };

    load_entitlements(db, &session).await.map(Some)
}

/// Read the four per-user documents and combine them.
pub async fn load_entitlements(
    db: &FirestoreDb,
    session: &SessionUser,
) -> Result<Entitlements, AppError> {
    let uid = session.uid.as_str();

    let (profile, unlocked, credits, wishlist) = tokio::try_join!(
        db.get_user_profile(uid),
        db.get_unlocked_puzzles(uid),
        db.get_available_credits(uid),
        db.get_wishlist(uid),
    )?;

    let entitlements = Entitlements::from_parts(
        session,
        profile,
        unlocked,
        credits,
        wishlist,
        chrono::Utc::now(),
    );

    tracing::debug!(
        uid,
        is_pro = entitlements.is_pro,
        credits = entitlements.credits,
        unlocked = entitlements.unlocked_puzzles.len(),
        "Resolved entitlements"
    );

    Ok(entitlements)
}
